use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use crate::client::{ApiError, VertexClient};
use crate::operation::DEFAULT_POLL_INTERVAL;

const TERMINAL_STATES: [&str; 4] = [
    "JOB_STATE_SUCCEEDED",
    "JOB_STATE_FAILED",
    "JOB_STATE_CANCELLED",
    "JOB_STATE_EXPIRED",
];

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("training job {name} ended in state {state}: {message}")]
    Failed {
        name: String,
        state: String,
        message: String,
    },
    #[error("timed out after {secs}s waiting for training job {name}")]
    Timeout { name: String, secs: u64 },
}

/// What to run for a fine-tuning round: the training container plus its
/// hyperparameter arguments. The gradient work happens inside the container.
#[derive(Debug, Clone)]
pub struct TrainingJobSpec {
    pub display_name: String,
    pub container_image: String,
    pub machine_type: String,
    pub args: Vec<String>,
}

pub fn custom_job_body(spec: &TrainingJobSpec) -> Value {
    json!({
        "displayName": spec.display_name,
        "jobSpec": {
            "workerPoolSpecs": [
                {
                    "machineSpec": {"machineType": spec.machine_type},
                    "replicaCount": 1,
                    "containerSpec": {
                        "imageUri": spec.container_image,
                        "args": spec.args,
                    },
                }
            ],
        },
    })
}

/// Submit a custom training job; returns the job resource name.
pub async fn submit(client: &VertexClient, spec: &TrainingJobSpec) -> Result<String, JobError> {
    let body = custom_job_body(spec);
    let path = format!("{}/customJobs", client.parent());
    tracing::info!(display_name = %spec.display_name, image = %spec.container_image, "submitting training job");

    let resp = client.post_json(&path, &body, "submit training job").await?;
    resp["name"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::Malformed {
                context: "submit training job".to_string(),
                reason: "missing job name".to_string(),
            }
            .into()
        })
}

/// Poll the job until it reaches a terminal state. Succeeds only on
/// `JOB_STATE_SUCCEEDED`.
pub async fn wait(client: &VertexClient, name: &str, timeout: Duration) -> Result<(), JobError> {
    let started = std::time::Instant::now();
    loop {
        let job = client.get_json(name, "poll training job").await?;
        let state = job["state"].as_str().unwrap_or("JOB_STATE_UNSPECIFIED");

        if state == "JOB_STATE_SUCCEEDED" {
            tracing::info!(job = %name, "training job succeeded");
            return Ok(());
        }
        if TERMINAL_STATES.contains(&state) {
            let message = job["error"]["message"].as_str().unwrap_or("").to_string();
            return Err(JobError::Failed {
                name: name.to_string(),
                state: state.to_string(),
                message,
            });
        }

        if started.elapsed() >= timeout {
            return Err(JobError::Timeout {
                name: name.to_string(),
                secs: timeout.as_secs(),
            });
        }
        tracing::debug!(job = %name, %state, "training job still running");
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_body_carries_worker_pool() {
        let spec = TrainingJobSpec {
            display_name: "timesfm-finetune-x".into(),
            container_image: "us-docker.pkg.dev/train/timesfm:latest".into(),
            machine_type: "n1-standard-8".into(),
            args: vec!["--epochs=5".into(), "--learning-rate=0.0001".into()],
        };
        let body = custom_job_body(&spec);
        let pool = &body["jobSpec"]["workerPoolSpecs"][0];

        assert_eq!(body["displayName"], "timesfm-finetune-x");
        assert_eq!(pool["machineSpec"]["machineType"], "n1-standard-8");
        assert_eq!(pool["replicaCount"], 1);
        assert_eq!(
            pool["containerSpec"]["imageUri"],
            "us-docker.pkg.dev/train/timesfm:latest"
        );
        assert_eq!(pool["containerSpec"]["args"][0], "--epochs=5");
    }
}
