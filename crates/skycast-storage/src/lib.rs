mod client;
mod uri;

pub use client::StorageClient;
pub use uri::GcsUri;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid object storage URI '{uri}': {reason}")]
    BadUri { uri: String, reason: String },
    #[error("object storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("object storage returned {status} for {context}: {body}")]
    Status {
        status: reqwest::StatusCode,
        context: String,
        body: String,
    },
    #[error("rewrite of {object} stalled: not done, but no rewriteToken to resume with")]
    Stalled { object: String },
}
