use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("platform returned {status} for {context}: {body}")]
    Status {
        status: StatusCode,
        context: String,
        body: String,
    },
    #[error("malformed platform response for {context}: {reason}")]
    Malformed { context: String, reason: String },
    #[error("operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },
    #[error("timed out after {secs}s waiting for operation {name}")]
    OperationTimeout { name: String, secs: u64 },
}

/// Thin client over the managed platform's regional REST API. Holds the
/// project/region scope and the bearer token; callers pass resource paths
/// relative to the `/v1/` root.
pub struct VertexClient {
    http: reqwest::Client,
    base: String,
    project: String,
    region: String,
    token: String,
}

impl VertexClient {
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let region = region.into();
        let base = format!("https://{region}-aiplatform.googleapis.com/v1");
        Self::with_base(project, region, token, base)
    }

    pub fn with_base(
        project: impl Into<String>,
        region: impl Into<String>,
        token: impl Into<String>,
        base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            project: project.into(),
            region: region.into(),
            token: token.into(),
        }
    }

    /// `projects/{project}/locations/{region}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.region)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub(crate) async fn get_json(&self, path: &str, context: &str) -> Result<Value, ApiError> {
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::into_json(resp, context).await
    }

    pub(crate) async fn post_json(
        &self,
        path: &str,
        body: &Value,
        context: &str,
    ) -> Result<Value, ApiError> {
        self.post_json_with_timeout(path, body, context, None).await
    }

    pub(crate) async fn post_json_with_timeout(
        &self,
        path: &str,
        body: &Value,
        context: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let mut request = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp = request.send().await?;
        Self::into_json(resp, context).await
    }

    async fn into_json(resp: reqwest::Response, context: &str) -> Result<Value, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                context: context.to_string(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        resp.json().await.map_err(|e| ApiError::Malformed {
            context: context.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_base_and_parent() {
        let client = VertexClient::new("demo-project", "us-central1", "token");
        assert_eq!(
            client.parent(),
            "projects/demo-project/locations/us-central1"
        );
        assert_eq!(
            client.url("projects/p/locations/r/endpoints/1:predict"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/r/endpoints/1:predict"
        );
    }

    #[test]
    fn url_tolerates_leading_slash() {
        let client = VertexClient::with_base("p", "r", "t", "http://localhost:1234/v1/");
        assert_eq!(client.url("/operations/5"), "http://localhost:1234/v1/operations/5");
    }
}
