use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use skycast_common::ServeConfig;

use crate::client::{ApiError, VertexClient};
use crate::operation::{self, operation_name, DEFAULT_POLL_INTERVAL};

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    RegisterModel,
    CreateEndpoint,
    BindModel,
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployStage::RegisterModel => "register model",
            DeployStage::CreateEndpoint => "create endpoint",
            DeployStage::BindModel => "bind model to endpoint",
        };
        f.write_str(name)
    }
}

/// Resources that existed when a deployment failed partway. There is no
/// automatic rollback; the caller reports these for manual cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialDeployment {
    pub model_resource: Option<String>,
    pub endpoint_resource: Option<String>,
}

#[derive(Debug, Error)]
#[error("deployment failed at stage '{stage}': {source}")]
pub struct DeployError {
    pub stage: DeployStage,
    pub partial: PartialDeployment,
    #[source]
    pub source: ApiError,
}

/// Outcome of a completed deployment pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub model_resource: String,
    pub endpoint_resource: String,
    pub deployed_model_id: Option<String>,
}

/// The three-step deployment pipeline: register the model, create an
/// endpoint, bind the model to it. Each step is a blocking remote call whose
/// typed result feeds the next; there is no retry and no rollback.
pub struct Deployer<'a> {
    client: &'a VertexClient,
    serve: &'a ServeConfig,
    artifact_uri: String,
}

impl<'a> Deployer<'a> {
    pub fn new(client: &'a VertexClient, serve: &'a ServeConfig, artifact_uri: String) -> Self {
        Self {
            client,
            serve,
            artifact_uri,
        }
    }

    pub async fn run(&self) -> Result<DeploymentRecord, DeployError> {
        let model_resource = self.register_model().await.map_err(|source| DeployError {
            stage: DeployStage::RegisterModel,
            partial: PartialDeployment::default(),
            source,
        })?;
        tracing::info!(model = %model_resource, "model registered");

        let endpoint_resource =
            self.create_endpoint().await.map_err(|source| DeployError {
                stage: DeployStage::CreateEndpoint,
                partial: PartialDeployment {
                    model_resource: Some(model_resource.clone()),
                    endpoint_resource: None,
                },
                source,
            })?;
        tracing::info!(endpoint = %endpoint_resource, "endpoint created");

        let deployed_model_id = self
            .bind_model(&model_resource, &endpoint_resource)
            .await
            .map_err(|source| DeployError {
                stage: DeployStage::BindModel,
                partial: PartialDeployment {
                    model_resource: Some(model_resource.clone()),
                    endpoint_resource: Some(endpoint_resource.clone()),
                },
                source,
            })?;
        tracing::info!(endpoint = %endpoint_resource, "model deployed");

        Ok(DeploymentRecord {
            model_resource,
            endpoint_resource,
            deployed_model_id,
        })
    }

    async fn register_model(&self) -> Result<String, ApiError> {
        let display_name = timestamped(&self.serve.model_display_name);
        let body = upload_model_body(self.serve, &self.artifact_uri, &display_name);
        let path = format!("{}/models:upload", self.client.parent());
        tracing::info!(%display_name, artifact = %self.artifact_uri, "uploading model");

        let resp = self.client.post_json(&path, &body, "upload model").await?;
        let op = operation_name(&resp, "upload model")?;
        let result =
            operation::wait(self.client, &op, DEFAULT_POLL_INTERVAL, DEFAULT_STEP_TIMEOUT)
                .await?;
        result["model"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Malformed {
                context: "upload model".to_string(),
                reason: "operation response missing model resource".to_string(),
            })
    }

    async fn create_endpoint(&self) -> Result<String, ApiError> {
        let display_name = format!("{}-endpoint", timestamped(&self.serve.model_display_name));
        let body = create_endpoint_body(self.serve, &display_name);
        let path = format!("{}/endpoints", self.client.parent());
        tracing::info!(%display_name, "creating endpoint");

        let resp = self
            .client
            .post_json(&path, &body, "create endpoint")
            .await?;
        let op = operation_name(&resp, "create endpoint")?;
        let result =
            operation::wait(self.client, &op, DEFAULT_POLL_INTERVAL, DEFAULT_STEP_TIMEOUT)
                .await?;
        result["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Malformed {
                context: "create endpoint".to_string(),
                reason: "operation response missing endpoint name".to_string(),
            })
    }

    async fn bind_model(
        &self,
        model_resource: &str,
        endpoint_resource: &str,
    ) -> Result<Option<String>, ApiError> {
        let body = deploy_model_body(self.serve, model_resource);
        let path = format!("{endpoint_resource}:deployModel");
        let timeout = Duration::from_secs(self.serve.deploy_request_timeout_s);
        tracing::info!(model = %model_resource, endpoint = %endpoint_resource, "binding model");

        let resp = self
            .client
            .post_json_with_timeout(&path, &body, "deploy model", Some(timeout))
            .await?;
        let op = operation_name(&resp, "deploy model")?;
        let result = operation::wait(self.client, &op, DEFAULT_POLL_INTERVAL, timeout).await?;
        Ok(result["deployedModel"]["id"].as_str().map(str::to_string))
    }
}

/// `{display_name}-{yyyymmddhhmmss}` — keeps repeated deployments distinct.
fn timestamped(display_name: &str) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    format!("{display_name}-{stamp}")
}

pub fn upload_model_body(serve: &ServeConfig, artifact_uri: &str, display_name: &str) -> Value {
    json!({
        "model": {
            "displayName": display_name,
            "artifactUri": artifact_uri,
            "containerSpec": {
                "imageUri": serve.serve_docker_uri,
                "ports": [{"containerPort": 8080}],
                "predictRoute": "/predict",
                "healthRoute": "/health",
                "env": [
                    {"name": "MODEL_ID", "value": format!("google/{}", serve.model_name)},
                    {"name": "DEPLOY_SOURCE", "value": serve.deploy_source},
                    {"name": "TIMESFM_HORIZON", "value": serve.horizon.to_string()},
                    {"name": "TIMESFM_BACKEND", "value": serve.backend},
                ],
            },
        },
    })
}

pub fn create_endpoint_body(serve: &ServeConfig, display_name: &str) -> Value {
    json!({
        "displayName": display_name,
        "dedicatedEndpointEnabled": serve.use_dedicated_endpoint,
    })
}

pub fn deploy_model_body(serve: &ServeConfig, model_resource: &str) -> Value {
    json!({
        "deployedModel": {
            "model": model_resource,
            "displayName": serve.model_display_name,
            "serviceAccount": serve.service_account,
            "enableAccessLogging": true,
            "dedicatedResources": {
                "machineSpec": {
                    "machineType": serve.machine_type,
                    "acceleratorType": serve.accelerator_type,
                    "acceleratorCount": serve.accelerator_count,
                },
                "minReplicaCount": 1,
            },
        },
        "trafficSplit": {"0": 100},
    })
}
