use serde::Deserialize;

use crate::{GcsUri, TransferError};

const DEFAULT_BASE: &str = "https://storage.googleapis.com";

/// Thin client over the object-storage JSON API. Copies are server-side
/// rewrites; object bytes never pass through this process.
pub struct StorageClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    done: bool,
    #[serde(default, rename = "rewriteToken")]
    rewrite_token: Option<String>,
}

impl StorageClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base(token, DEFAULT_BASE)
    }

    pub fn with_base(token: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// List all object names under `prefix`, following pagination.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, TransferError> {
        let url = format!("{}/storage/v1/b/{}/o", self.base, bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("prefix", prefix), ("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = request.send().await?;
            if !resp.status().is_success() {
                return Err(TransferError::Status {
                    status: resp.status(),
                    context: format!("list gs://{bucket}/{prefix}"),
                    body: resp.text().await.unwrap_or_default(),
                });
            }
            let page: ListResponse = resp.json().await?;
            names.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }

    /// Server-side copy of a single object, looping until the rewrite
    /// reports completion.
    pub async fn rewrite_object(
        &self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), TransferError> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}/rewriteTo/b/{}/o/{}",
            self.base,
            src_bucket,
            encode_object_name(src_name),
            dst_bucket,
            encode_object_name(dst_name),
        );

        let mut rewrite_token: Option<String> = None;
        loop {
            let mut request = self.http.post(&url).bearer_auth(&self.token);
            if let Some(token) = &rewrite_token {
                request = request.query(&[("rewriteToken", token.as_str())]);
            }

            let resp = request.send().await?;
            if !resp.status().is_success() {
                return Err(TransferError::Status {
                    status: resp.status(),
                    context: format!(
                        "rewrite gs://{src_bucket}/{src_name} -> gs://{dst_bucket}/{dst_name}"
                    ),
                    body: resp.text().await.unwrap_or_default(),
                });
            }
            let body: RewriteResponse = resp.json().await?;
            if body.done {
                return Ok(());
            }
            // an unfinished rewrite must hand back a token; without one the
            // same request would repeat forever
            match body.rewrite_token {
                Some(token) => rewrite_token = Some(token),
                None => {
                    return Err(TransferError::Stalled {
                        object: format!("gs://{src_bucket}/{src_name}"),
                    })
                }
            }
        }
    }

    /// Upload bytes as a single object (media upload). Overwrites any
    /// existing object of the same name.
    pub async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), TransferError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base, bucket);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media"), ("name", name)])
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TransferError::Status {
                status: resp.status(),
                context: format!("upload gs://{bucket}/{name}"),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        tracing::info!(object = %format!("gs://{bucket}/{name}"), "object uploaded");
        Ok(())
    }

    /// Copy every object under `source` to `dest`, swapping the prefix.
    /// Idempotent: existing destination objects are overwritten. Returns the
    /// number of objects copied.
    pub async fn copy_prefix(
        &self,
        source: &GcsUri,
        dest: &GcsUri,
    ) -> Result<usize, TransferError> {
        tracing::info!(%source, %dest, "copying model artifacts");

        let names = self.list_objects(&source.bucket, &source.prefix).await?;
        if names.is_empty() {
            tracing::warn!(%source, "no objects found under source prefix");
            return Ok(0);
        }

        for name in &names {
            let dst_name = destination_name(name, &source.prefix, &dest.prefix);
            tracing::debug!(src = %name, dst = %dst_name, "rewriting object");
            self.rewrite_object(&source.bucket, name, &dest.bucket, &dst_name)
                .await?;
        }

        tracing::info!(count = names.len(), %source, %dest, "artifact copy complete");
        Ok(names.len())
    }
}

/// Map a source object name to its destination name by swapping the first
/// occurrence of the source prefix.
pub fn destination_name(name: &str, src_prefix: &str, dst_prefix: &str) -> String {
    if src_prefix.is_empty() {
        if dst_prefix.is_empty() {
            return name.to_string();
        }
        return format!("{}/{}", dst_prefix.trim_end_matches('/'), name);
    }
    name.replacen(src_prefix, dst_prefix, 1)
}

/// Percent-encode an object name for use as a single URL path segment.
fn encode_object_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_swaps_first_prefix_occurrence_only() {
        assert_eq!(
            destination_name("models/timesfm/weights.bin", "models/timesfm", "timesfm"),
            "timesfm/weights.bin"
        );
        // later occurrences of the prefix are untouched
        assert_eq!(
            destination_name("m/x/m/x/file", "m/x", "out"),
            "out/m/x/file"
        );
    }

    #[test]
    fn destination_with_empty_source_prefix() {
        assert_eq!(destination_name("weights.bin", "", "timesfm"), "timesfm/weights.bin");
        assert_eq!(destination_name("weights.bin", "", ""), "weights.bin");
    }

    #[test]
    fn object_names_are_path_encoded() {
        assert_eq!(
            encode_object_name("models/timesfm 2.0/weights.bin"),
            "models%2Ftimesfm%202.0%2Fweights.bin"
        );
        assert_eq!(encode_object_name("plain-name_1.bin"), "plain-name_1.bin");
    }

    mod rewrite {
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use axum::extract::Query;
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::json;

        use super::super::*;

        /// Start the stub on a random loopback port and return its base URL.
        async fn serve_stub(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn rewrite_resumes_with_token_until_done() {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new().route(
                "/storage/v1/b/:src/o/:obj/rewriteTo/b/:dst/o/:dst_obj",
                post({
                    let calls = calls.clone();
                    move |Query(params): Query<HashMap<String, String>>| {
                        let calls = calls.clone();
                        async move {
                            match calls.fetch_add(1, Ordering::SeqCst) {
                                0 => {
                                    assert!(params.get("rewriteToken").is_none());
                                    Json(json!({"done": false, "rewriteToken": "round-2"}))
                                }
                                _ => {
                                    assert_eq!(
                                        params.get("rewriteToken").map(String::as_str),
                                        Some("round-2")
                                    );
                                    Json(json!({"done": true}))
                                }
                            }
                        }
                    }
                }),
            );

            let base = serve_stub(app).await;
            let client = StorageClient::with_base("test-token", base);
            client
                .rewrite_object("src-bucket", "weights.bin", "dst-bucket", "weights.bin")
                .await
                .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn unfinished_rewrite_without_token_is_stalled() {
            let app = Router::new().route(
                "/storage/v1/b/:src/o/:obj/rewriteTo/b/:dst/o/:dst_obj",
                post(|| async { Json(json!({"done": false})) }),
            );

            let base = serve_stub(app).await;
            let client = StorageClient::with_base("test-token", base);
            let err = client
                .rewrite_object("src-bucket", "weights.bin", "dst-bucket", "weights.bin")
                .await
                .unwrap_err();
            assert!(matches!(err, TransferError::Stalled { .. }), "got {err:?}");
        }
    }
}
