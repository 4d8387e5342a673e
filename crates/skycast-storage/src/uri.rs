use crate::TransferError;

/// A parsed `gs://bucket/prefix` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsUri {
    pub bucket: String,
    pub prefix: String,
}

impl GcsUri {
    pub fn parse(uri: &str) -> Result<Self, TransferError> {
        let rest = uri.strip_prefix("gs://").ok_or_else(|| TransferError::BadUri {
            uri: uri.to_string(),
            reason: "must start with 'gs://'".to_string(),
        })?;

        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_start_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(TransferError::BadUri {
                uri: uri.to_string(),
                reason: "bucket name is empty".to_string(),
            });
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl std::fmt::Display for GcsUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "gs://{}", self.bucket)
        } else {
            write!(f, "gs://{}/{}", self.bucket, self.prefix)
        }
    }
}
