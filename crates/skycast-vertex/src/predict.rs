use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use skycast_common::{Forecast, ForecastInstance};

use crate::client::VertexClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("prediction request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed prediction response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Forecast>,
}

/// Synchronous prediction against a deployed endpoint. One forecast is
/// returned per instance, in order.
pub async fn predict(
    client: &VertexClient,
    endpoint_resource: &str,
    instances: &[ForecastInstance],
) -> Result<Vec<Forecast>, InferenceError> {
    let body = json!({ "instances": instances });
    let path = format!("{endpoint_resource}:predict");
    tracing::info!(endpoint = %endpoint_resource, count = instances.len(), "requesting forecast");

    let value = client
        .post_json(&path, &body, "predict")
        .await
        .map_err(|e| match e {
            crate::client::ApiError::Request(err) => InferenceError::Request(err),
            crate::client::ApiError::Status { status, body, .. } => {
                InferenceError::Status { status, body }
            }
            other => InferenceError::Malformed(other.to_string()),
        })?;

    parse_response(value)
}

fn parse_response(value: serde_json::Value) -> Result<Vec<Forecast>, InferenceError> {
    let resp: PredictResponse =
        serde_json::from_value(value).map_err(|e| InferenceError::Malformed(e.to_string()))?;
    Ok(resp.predictions)
}
