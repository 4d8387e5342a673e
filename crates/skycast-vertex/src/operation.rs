use std::time::{Duration, Instant};

use serde_json::Value;

use crate::client::{ApiError, VertexClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Extract the operation name from a long-running-operation creation
/// response.
pub fn operation_name(response: &Value, context: &str) -> Result<String, ApiError> {
    response["name"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Malformed {
            context: context.to_string(),
            reason: "missing operation name".to_string(),
        })
}

/// Poll a long-running operation until it reports `done`, returning its
/// `response` payload. A `done` operation carrying an `error` surfaces the
/// platform's message as `OperationFailed`.
pub async fn wait(
    client: &VertexClient,
    name: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Value, ApiError> {
    let started = Instant::now();
    loop {
        let op = client.get_json(name, "poll operation").await?;
        if op["done"].as_bool().unwrap_or(false) {
            if let Some(error) = op.get("error") {
                let message = error["message"].as_str().unwrap_or("unknown error");
                return Err(ApiError::OperationFailed {
                    name: name.to_string(),
                    message: message.to_string(),
                });
            }
            return Ok(op.get("response").cloned().unwrap_or(Value::Null));
        }

        if started.elapsed() >= timeout {
            return Err(ApiError::OperationTimeout {
                name: name.to_string(),
                secs: timeout.as_secs(),
            });
        }
        tracing::debug!(operation = %name, "operation still running");
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_extracted_from_creation_response() {
        let resp = json!({"name": "projects/p/locations/r/operations/42"});
        assert_eq!(
            operation_name(&resp, "upload model").unwrap(),
            "projects/p/locations/r/operations/42"
        );
    }

    #[test]
    fn missing_name_is_malformed() {
        let err = operation_name(&json!({}), "upload model").unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
    }
}
