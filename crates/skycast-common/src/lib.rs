pub mod anomaly;
pub mod config;
pub mod forecast;
pub mod metrics;
pub mod registry;
pub mod telemetry;

pub use anomaly::{band_from_margin, flag_outliers, AnomalyError, AnomalyReport};
pub use config::{AppConfig, ConfigError, FinetuneConfig, ServeConfig, SetupConfig};
pub use forecast::{Forecast, ForecastInstance, InstanceBuilder, PayloadError};
pub use registry::EndpointRegistry;
