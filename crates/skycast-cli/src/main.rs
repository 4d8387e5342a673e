mod args;
mod chart;
mod data;
mod finetune;
mod output;

use std::path::Path;

use anyhow::Context;
use clap::Parser;

use skycast_common::config::ENDPOINTS_FILE;
use skycast_common::{anomaly, telemetry, AppConfig, EndpointRegistry, ForecastInstance};
use skycast_storage::{GcsUri, StorageClient};
use skycast_vertex::{Deployer, VertexClient};

use crate::args::{Args, Command};
use crate::chart::ChartInput;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let config = AppConfig::load(&args.config_dir)?;

    // resolved inside the arms that talk to the platform; `endpoints` only
    // reads the local registry and needs no credentials
    match args.command {
        Command::Stage { source, dest } => {
            let token = config.resolve_token(args.token)?;
            let source = GcsUri::parse(&source.unwrap_or_else(|| config.source_artifact_uri()))?;
            let dest = GcsUri::parse(&dest.unwrap_or_else(|| config.staged_artifact_uri()))?;

            let storage = StorageClient::new(&token);
            let copied = storage.copy_prefix(&source, &dest).await?;
            println!("✓ Copied {copied} objects from {source} to {dest}");
        }

        Command::Deploy => {
            let token = config.resolve_token(args.token)?;
            let client = client(&config, &token);
            let deployer = Deployer::new(&client, &config.serve, config.staged_artifact_uri());

            match deployer.run().await {
                Ok(record) => {
                    EndpointRegistry::record(
                        &args.config_dir.join(ENDPOINTS_FILE),
                        &record.endpoint_resource,
                    )?;
                    output::print_deployment(&record);
                }
                Err(err) => {
                    output::print_partial_deployment(&err);
                    return Err(err.into());
                }
            }
        }

        Command::Endpoints => {
            let registry = EndpointRegistry::load(&args.config_dir.join(ENDPOINTS_FILE))?;
            output::print_endpoints(&registry.endpoints);
        }

        Command::Predict {
            input,
            column,
            timestamp_column,
            timestamp_format,
            context_len,
            horizon,
            endpoint,
            output: output_path,
            chart: chart_path,
        } => {
            let series = data::load_series(&input, &column, timestamp_column.as_deref())?;
            let window =
                data::tail_split(&series, context_len, 0).context("input series is empty")?;
            let horizon = horizon.unwrap_or(config.serve.horizon);

            let mut builder = ForecastInstance::builder(window.context.clone(), horizon);
            if let Some(ts) = window.timestamps.clone() {
                builder = builder
                    .timestamps(ts)
                    .timestamp_format(timestamp_format.as_str());
            }
            let instance = builder.build()?;

            let token = config.resolve_token(args.token)?;
            let endpoint = resolve_endpoint(endpoint, &args.config_dir)?;
            let client = client(&config, &token);
            let forecasts = skycast_vertex::predict(&client, &endpoint, &[instance]).await?;
            output::print_forecast_summary(&forecasts);

            if let Some(path) = output_path {
                let json = serde_json::to_string_pretty(&forecasts)?;
                write_output(&path, json.as_bytes())?;
                println!("✓ Forecast saved to {}", path.display());
            }
            if let Some(path) = chart_path {
                let forecast = forecasts
                    .first()
                    .context("endpoint returned no predictions")?;
                let lower = forecast.quantile("p10");
                let upper = forecast.quantile("p90");
                let svg = chart::render(&ChartInput {
                    title: "Forecast",
                    context: &window.context,
                    point_forecast: &forecast.point_forecast,
                    lower: lower.as_deref(),
                    upper: upper.as_deref(),
                    ground_truth: None,
                });
                write_output(&path, svg.as_bytes())?;
                println!("✓ Chart saved to {}", path.display());
            }
        }

        Command::Anomaly {
            input,
            column,
            timestamp_column,
            timestamp_format,
            context_len,
            horizon,
            lower: lower_name,
            upper: upper_name,
            margin,
            endpoint,
            chart: chart_path,
        } => {
            let series = data::load_series(&input, &column, timestamp_column.as_deref())?;
            let window = data::tail_split(&series, context_len, horizon as usize)
                .context("series is shorter than the requested holdout")?;

            let mut builder = ForecastInstance::builder(window.context.clone(), horizon);
            if let Some(ts) = window.timestamps.clone() {
                builder = builder
                    .timestamps(ts)
                    .timestamp_format(timestamp_format.as_str());
            }
            let instance = builder.build()?;

            let token = config.resolve_token(args.token)?;
            let endpoint = resolve_endpoint(endpoint, &args.config_dir)?;
            let client = client(&config, &token);
            let forecasts = skycast_vertex::predict(&client, &endpoint, &[instance]).await?;
            let forecast = forecasts
                .first()
                .context("endpoint returned no predictions")?;

            let n = window.horizon.len().min(forecast.point_forecast.len());
            anyhow::ensure!(n > 0, "endpoint returned an empty forecast");
            let observed = &window.horizon[..n];
            let point = &forecast.point_forecast[..n];

            let (band_lower, band_upper) = match margin {
                Some(margin) => anomaly::band_from_margin(point, margin),
                None => {
                    let lower = forecast.quantile(&lower_name).with_context(|| {
                        format!("response has no '{lower_name}' quantile; use --margin")
                    })?;
                    let upper = forecast.quantile(&upper_name).with_context(|| {
                        format!("response has no '{upper_name}' quantile; use --margin")
                    })?;
                    anyhow::ensure!(
                        lower.len() >= n && upper.len() >= n,
                        "quantile series shorter than the holdout"
                    );
                    (lower[..n].to_vec(), upper[..n].to_vec())
                }
            };

            let report = anomaly::flag_outliers(observed, &band_lower, &band_upper)?;
            output::print_anomaly_table(observed, point, &band_lower, &band_upper, &report);

            if let Some(path) = chart_path {
                let svg = chart::render(&ChartInput {
                    title: "Anomaly Check",
                    context: &window.context,
                    point_forecast: point,
                    lower: Some(&band_lower),
                    upper: Some(&band_upper),
                    ground_truth: Some(observed),
                });
                write_output(&path, svg.as_bytes())?;
                println!("✓ Chart saved to {}", path.display());
            }
        }

        Command::Finetune {
            dataset,
            column,
            context_len,
            horizon,
            eval_only,
            endpoint,
            job_timeout_s,
            chart: chart_path,
        } => {
            let token = config.resolve_token(args.token)?;
            let endpoint = resolve_endpoint(endpoint, &args.config_dir)?;
            finetune::run(
                &config,
                &token,
                finetune::FinetuneParams {
                    dataset,
                    column,
                    context_len,
                    horizon,
                    eval_only,
                    endpoint,
                    job_timeout_s,
                    chart: chart_path,
                },
            )
            .await?;
        }
    }

    Ok(())
}

fn client(config: &AppConfig, token: &str) -> VertexClient {
    VertexClient::new(&config.setup.project_id, &config.setup.region, token)
}

fn resolve_endpoint(flag: Option<String>, config_dir: &Path) -> anyhow::Result<String> {
    if let Some(endpoint) = flag {
        return Ok(endpoint);
    }
    let registry = EndpointRegistry::load(&config_dir.join(ENDPOINTS_FILE))?;
    registry
        .latest()
        .map(str::to_string)
        .context("no endpoint recorded; pass --endpoint or run `skycast deploy` first")
}

fn write_output(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)
}
