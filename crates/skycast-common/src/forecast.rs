use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload validation failures, raised before any network call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("input series is empty")]
    EmptyInput,
    #[error("timestamp column has length {got}, expected input length {expected}")]
    TimestampLength { got: usize, expected: usize },
    #[error(
        "dynamic covariate '{name}' has length {got}, expected context + horizon = {expected}"
    )]
    CovariateLength {
        name: String,
        got: usize,
        expected: usize,
    },
}

/// One prediction instance, in the wire shape the serving container accepts.
///
/// Dynamic covariates must cover both the context and the horizon; the
/// builder enforces that before anything is serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastInstance {
    pub input: Vec<f64>,
    pub horizon: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_format: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_numerical_covariates: BTreeMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_categorical_covariates: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_categorical_covariates: BTreeMap<String, String>,
}

impl ForecastInstance {
    pub fn builder(input: Vec<f64>, horizon: u32) -> InstanceBuilder {
        InstanceBuilder {
            input,
            horizon,
            timestamp: None,
            timestamp_format: None,
            dynamic_numerical: BTreeMap::new(),
            dynamic_categorical: BTreeMap::new(),
            static_categorical: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    input: Vec<f64>,
    horizon: u32,
    timestamp: Option<Vec<String>>,
    timestamp_format: Option<String>,
    dynamic_numerical: BTreeMap<String, Vec<f64>>,
    dynamic_categorical: BTreeMap<String, Vec<String>>,
    static_categorical: BTreeMap<String, String>,
}

impl InstanceBuilder {
    /// One timestamp per context point.
    pub fn timestamps(mut self, timestamps: Vec<String>) -> Self {
        self.timestamp = Some(timestamps);
        self
    }

    /// strftime-style format of the supplied timestamps, e.g. `%Y-%m-%d`.
    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    /// Numeric covariate covering context + horizon.
    pub fn dynamic_numerical(mut self, name: impl Into<String>, series: Vec<f64>) -> Self {
        self.dynamic_numerical.insert(name.into(), series);
        self
    }

    /// Categorical covariate covering context + horizon.
    pub fn dynamic_categorical(mut self, name: impl Into<String>, series: Vec<String>) -> Self {
        self.dynamic_categorical.insert(name.into(), series);
        self
    }

    /// Per-series constant attribute, e.g. a country code.
    pub fn static_categorical(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.static_categorical.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ForecastInstance, PayloadError> {
        if self.input.is_empty() {
            return Err(PayloadError::EmptyInput);
        }
        let context_len = self.input.len();
        let covered = context_len + self.horizon as usize;

        if let Some(ts) = &self.timestamp {
            if ts.len() != context_len {
                return Err(PayloadError::TimestampLength {
                    got: ts.len(),
                    expected: context_len,
                });
            }
        }
        for (name, series) in &self.dynamic_numerical {
            if series.len() != covered {
                return Err(PayloadError::CovariateLength {
                    name: name.clone(),
                    got: series.len(),
                    expected: covered,
                });
            }
        }
        for (name, series) in &self.dynamic_categorical {
            if series.len() != covered {
                return Err(PayloadError::CovariateLength {
                    name: name.clone(),
                    got: series.len(),
                    expected: covered,
                });
            }
        }

        Ok(ForecastInstance {
            input: self.input,
            horizon: self.horizon,
            timestamp: self.timestamp,
            timestamp_format: self.timestamp_format,
            dynamic_numerical_covariates: self.dynamic_numerical,
            dynamic_categorical_covariates: self.dynamic_categorical,
            static_categorical_covariates: self.static_categorical,
        })
    }
}

/// One forecast from the endpoint: the point forecast plus whatever quantile
/// series the serving container returned (`p10` .. `p90`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub point_forecast: Vec<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Forecast {
    /// Look up a quantile series by name, e.g. `p10`.
    pub fn quantile(&self, name: &str) -> Option<Vec<f64>> {
        let values = self.extra.get(name)?.as_array()?;
        values.iter().map(|v| v.as_f64()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_round_trips_in_order() {
        let series = vec![1.0, 2.0, 3.0];
        let instance = ForecastInstance::builder(series.clone(), 4).build().unwrap();
        assert_eq!(instance.input, series);

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["input"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(json["horizon"], 4);
        // unset optional fields stay off the wire
        assert!(json.get("timestamp").is_none());
        assert!(json.get("dynamic_numerical_covariates").is_none());
    }

    #[test]
    fn empty_input_rejected() {
        let err = ForecastInstance::builder(vec![], 4).build().unwrap_err();
        assert_eq!(err, PayloadError::EmptyInput);
    }

    #[test]
    fn covariate_must_cover_context_and_horizon() {
        // context 3 + horizon 2 = 5; a length-3 covariate is rejected
        let err = ForecastInstance::builder(vec![1.0, 2.0, 3.0], 2)
            .dynamic_numerical("gen_forecast", vec![0.1, 0.2, 0.3])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            PayloadError::CovariateLength {
                name: "gen_forecast".into(),
                got: 3,
                expected: 5,
            }
        );

        let ok = ForecastInstance::builder(vec![1.0, 2.0, 3.0], 2)
            .dynamic_numerical("gen_forecast", vec![0.1, 0.2, 0.3, 0.4, 0.5])
            .dynamic_categorical(
                "week_day",
                vec!["0", "1", "2", "3", "4"].into_iter().map(String::from).collect(),
            )
            .static_categorical("country", "DE")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn timestamps_must_match_context() {
        let err = ForecastInstance::builder(vec![1.0, 2.0, 3.0], 2)
            .timestamps(vec!["2024-01-01".into()])
            .timestamp_format("%Y-%m-%d")
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::TimestampLength { got: 1, expected: 3 });
    }

    #[test]
    fn forecast_quantiles_by_name() {
        let json = serde_json::json!({
            "point_forecast": [4.0, 5.0, 6.0],
            "p10": [3.0, 4.0, 5.0],
            "p90": [5.0, 6.0, 7.0],
        });
        let forecast: Forecast = serde_json::from_value(json).unwrap();
        assert_eq!(forecast.point_forecast, vec![4.0, 5.0, 6.0]);
        assert_eq!(forecast.quantile("p10"), Some(vec![3.0, 4.0, 5.0]));
        assert_eq!(forecast.quantile("p50"), None);
    }
}
