pub mod client;
pub mod deploy;
pub mod job;
pub mod operation;
pub mod predict;

pub use client::{ApiError, VertexClient};
pub use deploy::{DeployError, DeployStage, Deployer, DeploymentRecord, PartialDeployment};
pub use job::{JobError, TrainingJobSpec};
pub use predict::{predict, InferenceError};
