use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "skycast")]
#[command(about = "Stage, deploy, and invoke a TimesFM forecasting endpoint", long_about = None)]
pub struct Args {
    /// Directory holding setup.yml, serve.yml, and endpoints.yml
    #[arg(long, default_value = "./config")]
    pub config_dir: PathBuf,

    /// Platform access token (Authorization: Bearer)
    #[arg(long, env = "SKYCAST_ACCESS_TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy model artifacts from the public source into the project bucket
    Stage {
        /// Override the source artifact URI (default: model_location/model_name)
        #[arg(long)]
        source: Option<String>,

        /// Override the destination URI (default: gs://{bucket_name}/timesfm)
        #[arg(long)]
        dest: Option<String>,
    },

    /// Register the model, create an endpoint, and bind the model to it
    Deploy,

    /// List endpoints recorded by past deployments
    Endpoints,

    /// Request a forecast from the deployed endpoint
    Predict {
        /// CSV or JSON file holding the input series
        #[arg(long)]
        input: PathBuf,

        /// Value column name
        #[arg(long, default_value = "value")]
        column: String,

        /// Timestamp column name, if the file has one
        #[arg(long)]
        timestamp_column: Option<String>,

        /// strftime format of the timestamp column
        #[arg(long, default_value = "%Y-%m-%d")]
        timestamp_format: String,

        /// Context points taken from the end of the series
        #[arg(long, default_value_t = 512)]
        context_len: usize,

        /// Forecast horizon (default: the configured serving horizon)
        #[arg(long)]
        horizon: Option<u32>,

        /// Endpoint resource name (default: most recently deployed)
        #[arg(long)]
        endpoint: Option<String>,

        /// Write the raw forecast JSON here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write an SVG chart here
        #[arg(long)]
        chart: Option<PathBuf>,
    },

    /// Hold out the series tail, forecast it, and flag observations outside
    /// the forecast band
    Anomaly {
        /// CSV or JSON file holding the observed series
        #[arg(long)]
        input: PathBuf,

        /// Value column name
        #[arg(long, default_value = "value")]
        column: String,

        /// Timestamp column name, if the file has one
        #[arg(long)]
        timestamp_column: Option<String>,

        /// strftime format of the timestamp column
        #[arg(long, default_value = "%Y-%m-%d")]
        timestamp_format: String,

        /// Context points preceding the held-out tail
        #[arg(long, default_value_t = 512)]
        context_len: usize,

        /// Held-out points to compare against the forecast
        #[arg(long, default_value_t = 24)]
        horizon: u32,

        /// Lower quantile of the band
        #[arg(long, default_value = "p10")]
        lower: String,

        /// Upper quantile of the band
        #[arg(long, default_value = "p90")]
        upper: String,

        /// Fixed ± margin around the point forecast instead of quantiles
        #[arg(long)]
        margin: Option<f64>,

        /// Endpoint resource name (default: most recently deployed)
        #[arg(long)]
        endpoint: Option<String>,

        /// Write an SVG chart here
        #[arg(long)]
        chart: Option<PathBuf>,
    },

    /// Fine-tune via a managed training job, then evaluate held-out windows
    Finetune {
        /// CSV dataset to fine-tune on
        #[arg(long)]
        dataset: PathBuf,

        /// Value column name
        #[arg(long, default_value = "value")]
        column: String,

        /// Context length of each training window
        #[arg(long, default_value_t = 120)]
        context_len: usize,

        /// Horizon length of each training window
        #[arg(long, default_value_t = 24)]
        horizon: u32,

        /// Skip the training job and only run the evaluation
        #[arg(long, default_value_t = false)]
        eval_only: bool,

        /// Endpoint used for evaluation (default: most recently deployed)
        #[arg(long)]
        endpoint: Option<String>,

        /// Max seconds to wait for the training job
        #[arg(long, default_value_t = 7200)]
        job_timeout_s: u64,

        /// Write an SVG chart of the worst window here
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_parses_without_a_token() {
        let args = Args::try_parse_from(["skycast", "endpoints"]).unwrap();
        assert!(args.token.is_none());
        assert!(matches!(args.command, Command::Endpoints));
    }

    #[test]
    fn token_flag_precedes_the_subcommand() {
        let args = Args::try_parse_from(["skycast", "--token", "t-1", "deploy"]).unwrap();
        assert_eq!(args.token.as_deref(), Some("t-1"));
        assert!(matches!(args.command, Command::Deploy));
    }
}
