use skycast_common::{AnomalyReport, Forecast};
use skycast_vertex::{DeployError, DeploymentRecord};

pub fn print_deployment(record: &DeploymentRecord) {
    println!("\n=== Deployment Complete ===\n");
    println!("  Model:     {}", record.model_resource);
    println!("  Endpoint:  {}", record.endpoint_resource);
    if let Some(id) = &record.deployed_model_id {
        println!("  Deployed:  {id}");
    }
    println!();
}

/// Report what a failed pipeline left behind; nothing is rolled back.
pub fn print_partial_deployment(err: &DeployError) {
    eprintln!("✗ Deployment failed at stage '{}'", err.stage);
    match &err.partial.model_resource {
        Some(model) => eprintln!("  Model registered:  {model}  (manual cleanup needed)"),
        None => eprintln!("  Model registered:  (none)"),
    }
    match &err.partial.endpoint_resource {
        Some(endpoint) => {
            eprintln!("  Endpoint created:  {endpoint}  (manual cleanup needed)")
        }
        None => eprintln!("  Endpoint created:  (none)"),
    }
}

pub fn print_endpoints(endpoints: &[String]) {
    println!("\n=== Recorded Endpoints ===\n");
    if endpoints.is_empty() {
        println!("  (none — run `skycast deploy` first)");
    } else {
        for (i, endpoint) in endpoints.iter().enumerate() {
            let marker = if i == endpoints.len() - 1 { "*" } else { " " };
            println!("  {marker} {endpoint}");
        }
        println!("\n  (* = default for predict/anomaly)");
    }
    println!();
}

pub fn print_forecast_summary(forecasts: &[Forecast]) {
    println!("\n=== Forecast ===\n");
    for (i, forecast) in forecasts.iter().enumerate() {
        let quantiles: Vec<&str> = forecast
            .extra
            .keys()
            .filter(|k| k.starts_with('p'))
            .map(String::as_str)
            .collect();
        println!(
            "  [{}] {} points, quantiles: {}",
            i,
            forecast.point_forecast.len(),
            if quantiles.is_empty() {
                "(none)".to_string()
            } else {
                quantiles.join(", ")
            }
        );
        let preview: Vec<String> = forecast
            .point_forecast
            .iter()
            .take(8)
            .map(|v| format!("{v:.3}"))
            .collect();
        let ellipsis = if forecast.point_forecast.len() > 8 { " …" } else { "" };
        println!("      {}{}", preview.join(", "), ellipsis);
    }
    println!();
}

pub fn print_anomaly_table(
    observed: &[f64],
    point: &[f64],
    lower: &[f64],
    upper: &[f64],
    report: &AnomalyReport,
) {
    println!("\n=== Anomaly Check ===\n");
    println!(
        "  {:<6} {:>12} {:>12} {:>12} {:>12}  {}",
        "Index", "Observed", "Forecast", "Lower", "Upper", "Flag"
    );
    for (i, &flagged) in report.is_anomaly.iter().enumerate() {
        println!(
            "  {:<6} {:>12.3} {:>12.3} {:>12.3} {:>12.3}  {}",
            i,
            observed[i],
            point[i],
            lower[i],
            upper[i],
            if flagged { "ANOMALY" } else { "" }
        );
    }
    println!(
        "\n  {} of {} points outside the band",
        report.count(),
        report.is_anomaly.len()
    );
    println!();
}

/// `worst` is `(window index, series offset, MAE)`.
pub fn print_eval_metrics(windows: usize, mae: f64, rmse: f64, worst: Option<(usize, usize, f64)>) {
    println!("\n=== Held-Out Evaluation ===\n");
    println!("  Windows:  {windows}");
    println!("  MAE:      {mae:.4}");
    println!("  RMSE:     {rmse:.4}");
    if let Some((index, start, window_mae)) = worst {
        println!("  Worst:    window {index} at offset {start} (MAE {window_mae:.4})");
    }
    println!();
}
