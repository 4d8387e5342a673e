use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETUP_FILE: &str = "setup.yml";
pub const SERVE_FILE: &str = "serve.yml";
pub const ENDPOINTS_FILE: &str = "endpoints.yml";

/// Environment variable consulted for the platform access token.
pub const TOKEN_ENV: &str = "SKYCAST_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(
        "no access token found: pass --token, set SKYCAST_ACCESS_TOKEN, or put an \
         `access_token` key in {0}"
    )]
    MissingToken(PathBuf),
}

/// Project-level settings, read from `setup.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetupConfig {
    pub project_id: String,
    pub region: String,
    pub bucket_name: String,
    /// YAML file holding an `access_token` key; consulted when neither the
    /// `--token` flag nor the env var supplies one.
    pub credentials_file: PathBuf,
}

/// Serving settings, read from `serve.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServeConfig {
    /// Public bucket URI holding the released model artifacts.
    pub model_location: String,
    pub model_name: String,
    pub serve_docker_uri: String,
    pub service_account: String,
    pub model_display_name: String,
    pub machine_type: String,
    pub accelerator_type: String,
    pub accelerator_count: u32,
    pub deploy_source: String,
    pub use_dedicated_endpoint: bool,
    /// Forecast horizon the serving container is configured for.
    pub horizon: u32,
    pub backend: String,
    pub deploy_request_timeout_s: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finetune: Option<FinetuneConfig>,
}

/// Optional fine-tuning section of `serve.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinetuneConfig {
    pub train_docker_uri: String,
    pub machine_type: String,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_epochs() -> u32 {
    5
}

fn default_learning_rate() -> f64 {
    1e-4
}

/// Everything a command needs, loaded once per invocation and immutable after.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub setup: SetupConfig,
    pub serve: ServeConfig,
}

impl AppConfig {
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            setup: load_yaml(&config_dir.join(SETUP_FILE))?,
            serve: load_yaml(&config_dir.join(SERVE_FILE))?,
        })
    }

    /// Where the stager places artifacts and the deployer reads them from.
    pub fn staged_artifact_uri(&self) -> String {
        format!("gs://{}/timesfm", self.setup.bucket_name)
    }

    /// Public source the artifacts are copied from.
    pub fn source_artifact_uri(&self) -> String {
        format!(
            "{}/{}",
            self.serve.model_location.trim_end_matches('/'),
            self.serve.model_name
        )
    }

    /// Resolve the bearer token: flag/env first, then the credentials file
    /// named in `setup.yml`.
    pub fn resolve_token(&self, cli_token: Option<String>) -> Result<String, ConfigError> {
        if let Some(token) = cli_token.filter(|t| !t.is_empty()) {
            return Ok(token);
        }
        let creds: CredentialsFile = load_yaml(&self.setup.credentials_file)?;
        creds
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingToken(self.setup.credentials_file.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    access_token: Option<String>,
}

pub(crate) fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP_YML: &str = "\
project_id: demo-project
region: us-central1
bucket_name: demo-bucket
credentials_file: ./credentials/platform.yml
";

    const SERVE_YML: &str = "\
model_location: gs://public-models
model_name: timesfm-2.0-500m
serve_docker_uri: us-docker.pkg.dev/serving/timesfm:latest
service_account: serving@demo-project.iam.gserviceaccount.com
model_display_name: timesfm
machine_type: g2-standard-16
accelerator_type: NVIDIA_L4
accelerator_count: 1
deploy_source: notebook
use_dedicated_endpoint: true
horizon: 128
backend: gpu
deploy_request_timeout_s: 1800
";

    fn write_config_dir(setup: &str, serve: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETUP_FILE), setup).unwrap();
        std::fs::write(dir.path().join(SERVE_FILE), serve).unwrap();
        dir
    }

    #[test]
    fn load_returns_values_unmodified() {
        let dir = write_config_dir(SETUP_YML, SERVE_YML);
        let cfg = AppConfig::load(dir.path()).unwrap();

        assert_eq!(cfg.setup.project_id, "demo-project");
        assert_eq!(cfg.setup.region, "us-central1");
        assert_eq!(cfg.serve.model_name, "timesfm-2.0-500m");
        assert_eq!(cfg.serve.horizon, 128);
        assert_eq!(cfg.serve.accelerator_count, 1);
        assert!(cfg.serve.use_dedicated_endpoint);
        assert!(cfg.serve.finetune.is_none());
    }

    #[test]
    fn derived_uris() {
        let dir = write_config_dir(SETUP_YML, SERVE_YML);
        let cfg = AppConfig::load(dir.path()).unwrap();

        assert_eq!(cfg.staged_artifact_uri(), "gs://demo-bucket/timesfm");
        assert_eq!(
            cfg.source_artifact_uri(),
            "gs://public-models/timesfm-2.0-500m"
        );
    }

    #[test]
    fn missing_required_key_is_parse_error() {
        let setup_missing_region = "\
project_id: demo-project
bucket_name: demo-bucket
credentials_file: ./credentials/platform.yml
";
        let dir = write_config_dir(setup_missing_region, SERVE_YML);
        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn finetune_section_defaults() {
        let serve = format!(
            "{SERVE_YML}finetune:\n  train_docker_uri: us-docker.pkg.dev/train/timesfm:latest\n  machine_type: n1-standard-8\n"
        );
        let dir = write_config_dir(SETUP_YML, &serve);
        let cfg = AppConfig::load(dir.path()).unwrap();
        let ft = cfg.serve.finetune.unwrap();
        assert_eq!(ft.epochs, 5);
        assert_eq!(ft.learning_rate, 1e-4);
    }

    #[test]
    fn token_prefers_cli_over_file() {
        let dir = write_config_dir(SETUP_YML, SERVE_YML);
        let creds_path = dir.path().join("creds.yml");
        std::fs::write(&creds_path, "access_token: from-file\n").unwrap();

        let mut cfg = AppConfig::load(dir.path()).unwrap();
        cfg.setup.credentials_file = creds_path;

        assert_eq!(
            cfg.resolve_token(Some("from-flag".into())).unwrap(),
            "from-flag"
        );
        assert_eq!(cfg.resolve_token(None).unwrap(), "from-file");
    }

    #[test]
    fn empty_token_everywhere_is_missing_token() {
        let dir = write_config_dir(SETUP_YML, SERVE_YML);
        let creds_path = dir.path().join("creds.yml");
        std::fs::write(&creds_path, "access_token: \"\"\n").unwrap();

        let mut cfg = AppConfig::load(dir.path()).unwrap();
        cfg.setup.credentials_file = creds_path;

        let err = cfg.resolve_token(Some(String::new())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken(_)));
    }
}
