//! Fine-tuning flow: ship the dataset, run a managed training job, then
//! score held-out windows through the live endpoint. The gradient work
//! happens inside the training container, not here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use skycast_common::{metrics, AppConfig, ForecastInstance};
use skycast_storage::StorageClient;
use skycast_vertex::{job, predict, TrainingJobSpec, VertexClient};

use crate::chart::{self, ChartInput};
use crate::data::{self, Window};
use crate::output;

/// Largest evaluation batch sent in one prediction request.
const MAX_EVAL_WINDOWS: usize = 32;

pub struct FinetuneParams {
    pub dataset: PathBuf,
    pub column: String,
    pub context_len: usize,
    pub horizon: u32,
    pub eval_only: bool,
    pub endpoint: String,
    pub job_timeout_s: u64,
    pub chart: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, token: &str, params: FinetuneParams) -> anyhow::Result<()> {
    let series = data::load_series(&params.dataset, &params.column, None)?;
    let horizon_len = params.horizon as usize;
    let windows = data::make_windows(&series, params.context_len, horizon_len, horizon_len);
    anyhow::ensure!(
        !windows.is_empty(),
        "dataset has {} points, fewer than context {} + horizon {}",
        series.values.len(),
        params.context_len,
        horizon_len
    );
    tracing::info!(windows = windows.len(), "prepared training windows");

    let client = VertexClient::new(&config.setup.project_id, &config.setup.region, token);

    if !params.eval_only {
        run_training_job(config, token, &client, &params).await?;
    }

    evaluate(&client, &params, &windows).await
}

async fn run_training_job(
    config: &AppConfig,
    token: &str,
    client: &VertexClient,
    params: &FinetuneParams,
) -> anyhow::Result<()> {
    let finetune = config
        .serve
        .finetune
        .as_ref()
        .context("serve.yml has no `finetune` section")?;

    // the training container reads the dataset from the project bucket
    let dataset_uri =
        upload_dataset(token, &config.setup.bucket_name, &params.dataset).await?;

    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let spec = TrainingJobSpec {
        display_name: format!("{}-finetune-{stamp}", config.serve.model_display_name),
        container_image: finetune.train_docker_uri.clone(),
        machine_type: finetune.machine_type.clone(),
        args: vec![
            format!("--dataset={dataset_uri}"),
            format!("--value-column={}", params.column),
            format!("--context-len={}", params.context_len),
            format!("--horizon={}", params.horizon),
            format!("--epochs={}", finetune.epochs),
            format!("--learning-rate={}", finetune.learning_rate),
        ],
    };

    let job_name = job::submit(client, &spec).await?;
    println!("✓ Training job submitted: {job_name}");
    job::wait(client, &job_name, Duration::from_secs(params.job_timeout_s)).await?;
    println!("✓ Training job finished");
    Ok(())
}

async fn upload_dataset(token: &str, bucket: &str, dataset: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(dataset)
        .with_context(|| format!("failed to read dataset {}", dataset.display()))?;
    let file_name = dataset
        .file_name()
        .and_then(|n| n.to_str())
        .context("dataset path has no file name")?;
    let object = format!("datasets/{file_name}");

    let storage = StorageClient::new(token);
    storage
        .upload_object(bucket, &object, bytes, "text/csv")
        .await?;
    Ok(format!("gs://{bucket}/{object}"))
}

async fn evaluate(
    client: &VertexClient,
    params: &FinetuneParams,
    windows: &[Window],
) -> anyhow::Result<()> {
    let eval = &windows[windows.len().saturating_sub(MAX_EVAL_WINDOWS)..];
    let instances = eval
        .iter()
        .map(|w| ForecastInstance::builder(w.context.clone(), params.horizon).build())
        .collect::<Result<Vec<_>, _>>()?;

    let forecasts = predict(client, &params.endpoint, &instances).await?;
    anyhow::ensure!(
        forecasts.len() == instances.len(),
        "endpoint returned {} forecasts for {} instances",
        forecasts.len(),
        instances.len()
    );

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut points = 0usize;
    let mut window_maes = Vec::with_capacity(eval.len());

    for (i, (window, forecast)) in eval.iter().zip(&forecasts).enumerate() {
        let n = window.horizon.len().min(forecast.point_forecast.len());
        anyhow::ensure!(n > 0, "endpoint returned an empty forecast for window {i}");
        let actual = &window.horizon[..n];
        let predicted = &forecast.point_forecast[..n];

        for (a, p) in actual.iter().zip(predicted) {
            abs_sum += (a - p).abs();
            sq_sum += (a - p) * (a - p);
        }
        points += n;

        window_maes.push(metrics::mae(actual, predicted).context("empty evaluation window")?);
    }

    let worst = worst_window(&window_maes);
    let mae = abs_sum / points as f64;
    let rmse = (sq_sum / points as f64).sqrt();
    output::print_eval_metrics(
        eval.len(),
        mae,
        rmse,
        worst.map(|(i, m)| (i, eval[i].start, m)),
    );

    if let Some(path) = &params.chart {
        let (index, _) = worst.context("no evaluation windows scored")?;
        let window = &eval[index];
        let forecast = &forecasts[index];
        let n = window.horizon.len().min(forecast.point_forecast.len());
        let lower = forecast.quantile("p10");
        let upper = forecast.quantile("p90");
        let svg = chart::render(&ChartInput {
            title: &format!("Held-Out Window {index} (offset {})", window.start),
            context: &window.context,
            point_forecast: &forecast.point_forecast[..n],
            lower: lower.as_deref().map(|l| &l[..n.min(l.len())]),
            upper: upper.as_deref().map(|u| &u[..n.min(u.len())]),
            ground_truth: Some(&window.horizon[..n]),
        });
        crate::write_output(path, svg.as_bytes())?;
        println!("✓ Chart saved to {}", path.display());
    }

    Ok(())
}

/// Index and MAE of the worst-scoring evaluation window.
fn worst_window(maes: &[f64]) -> Option<(usize, f64)> {
    let mut worst: Option<(usize, f64)> = None;
    for (i, &mae) in maes.iter().enumerate() {
        if worst.map_or(true, |(_, w)| mae > w) {
            worst = Some((i, mae));
        }
    }
    worst
}
