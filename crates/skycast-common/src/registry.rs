use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{load_yaml, ConfigError};

/// Endpoint resource names recorded by past deployments
/// (`config/endpoints.yml`). Invoker commands default to the most recent
/// entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointRegistry {
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl EndpointRegistry {
    /// Load the registry; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        load_yaml(path)
    }

    /// The most recently recorded endpoint resource name.
    pub fn latest(&self) -> Option<&str> {
        self.endpoints.last().map(String::as_str)
    }

    /// Append a resource name and write the registry back.
    pub fn record(path: &Path, resource_name: &str) -> Result<(), ConfigError> {
        let mut registry = Self::load(path)?;
        registry.endpoints.push(resource_name.to_string());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = serde_yaml::to_string(&registry).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
