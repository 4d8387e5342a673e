use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("json error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("row {row}: '{value}' is not numeric")]
    BadValue { row: usize, value: String },
    #[error("unsupported input format '{0}' (expected .csv or .json)")]
    UnsupportedFormat(String),
    #[error("input file contains no data rows")]
    Empty,
}

/// An observed series, optionally with one timestamp string per value.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub values: Vec<f64>,
    pub timestamps: Option<Vec<String>>,
}

/// Load a series from a CSV file (header row required) or a JSON file
/// (either a bare array of numbers or an array of objects).
pub fn load_series(
    path: &Path,
    value_column: &str,
    timestamp_column: Option<&str>,
) -> Result<Series, DataError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let series = match ext.as_str() {
        "csv" => load_csv(path, value_column, timestamp_column)?,
        "json" => load_json(path, value_column, timestamp_column)?,
        other => return Err(DataError::UnsupportedFormat(other.to_string())),
    };
    if series.values.is_empty() {
        return Err(DataError::Empty);
    }
    tracing::info!(path = %path.display(), points = series.values.len(), "loaded series");
    Ok(series)
}

fn load_csv(
    path: &Path,
    value_column: &str,
    timestamp_column: Option<&str>,
) -> Result<Series, DataError> {
    let display = path.display().to_string();
    let mut reader = csv::Reader::from_path(path).map_err(|source| DataError::Csv {
        path: display.clone(),
        source,
    })?;

    let headers = reader
        .headers()
        .map_err(|source| DataError::Csv {
            path: display.clone(),
            source,
        })?
        .clone();
    let value_idx = headers
        .iter()
        .position(|h| h == value_column)
        .ok_or_else(|| DataError::MissingColumn(value_column.to_string()))?;
    let ts_idx = match timestamp_column {
        Some(name) => Some(
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataError::MissingColumn(name.to_string()))?,
        ),
        None => None,
    };

    let mut values = Vec::new();
    let mut timestamps = ts_idx.map(|_| Vec::new());
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|source| DataError::Csv {
            path: display.clone(),
            source,
        })?;
        let raw = record.get(value_idx).unwrap_or("");
        let value: f64 = raw.trim().parse().map_err(|_| DataError::BadValue {
            row: row + 1,
            value: raw.to_string(),
        })?;
        values.push(value);
        if let (Some(ts), Some(idx)) = (timestamps.as_mut(), ts_idx) {
            ts.push(record.get(idx).unwrap_or("").to_string());
        }
    }

    Ok(Series { values, timestamps })
}

fn load_json(
    path: &Path,
    value_column: &str,
    timestamp_column: Option<&str>,
) -> Result<Series, DataError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: display.clone(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| DataError::Json {
            path: display.clone(),
            source,
        })?;

    let rows = match value.as_array() {
        Some(rows) => rows,
        None => return Err(DataError::MissingColumn(value_column.to_string())),
    };

    // bare array of numbers
    if rows.iter().all(|v| v.is_number()) {
        let values = rows.iter().filter_map(|v| v.as_f64()).collect();
        return Ok(Series {
            values,
            timestamps: None,
        });
    }

    // array of objects
    let mut values = Vec::new();
    let mut timestamps = timestamp_column.map(|_| Vec::new());
    for (row, entry) in rows.iter().enumerate() {
        let raw = entry
            .get(value_column)
            .ok_or_else(|| DataError::MissingColumn(value_column.to_string()))?;
        let value = raw.as_f64().ok_or_else(|| DataError::BadValue {
            row: row + 1,
            value: raw.to_string(),
        })?;
        values.push(value);
        if let (Some(ts), Some(name)) = (timestamps.as_mut(), timestamp_column) {
            let stamp = entry
                .get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
            ts.push(stamp.to_string());
        }
    }

    Ok(Series { values, timestamps })
}

/// One (context, held-out horizon) pair cut from a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start: usize,
    pub context: Vec<f64>,
    pub horizon: Vec<f64>,
    pub timestamps: Option<Vec<String>>,
}

/// Cut a series into overlapping evaluation windows, advancing by `stride`.
pub fn make_windows(
    series: &Series,
    context_len: usize,
    horizon_len: usize,
    stride: usize,
) -> Vec<Window> {
    let mut windows = Vec::new();
    if context_len == 0 || horizon_len == 0 || stride == 0 {
        return windows;
    }
    let total = context_len + horizon_len;
    if series.values.len() < total {
        return windows;
    }

    let mut start = 0;
    while start + total <= series.values.len() {
        let context_end = start + context_len;
        windows.push(Window {
            start,
            context: series.values[start..context_end].to_vec(),
            horizon: series.values[context_end..context_end + horizon_len].to_vec(),
            timestamps: series
                .timestamps
                .as_ref()
                .map(|ts| ts[start..context_end].to_vec()),
        });
        start += stride;
    }
    windows
}

/// The tail split used by `predict` and `anomaly`: up to `context_len`
/// points of context followed by `holdout` observed points.
pub fn tail_split(series: &Series, context_len: usize, holdout: usize) -> Option<Window> {
    let len = series.values.len();
    if holdout >= len {
        return None;
    }
    let context_end = len - holdout;
    let start = context_end.saturating_sub(context_len);
    if start == context_end {
        return None;
    }
    Some(Window {
        start,
        context: series.values[start..context_end].to_vec(),
        horizon: series.values[context_end..].to_vec(),
        timestamps: series
            .timestamps
            .as_ref()
            .map(|ts| ts[start..context_end].to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn series(n: usize) -> Series {
        Series {
            values: (0..n).map(|i| i as f64).collect(),
            timestamps: None,
        }
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "date,meantemp").unwrap();
        writeln!(file, "2024-01-01,10.5").unwrap();
        writeln!(file, "2024-01-02,11.25").unwrap();
        drop(file);

        let loaded = load_series(&path, "meantemp", Some("date")).unwrap();
        assert_eq!(loaded.values, vec![10.5, 11.25]);
        assert_eq!(
            loaded.timestamps.unwrap(),
            vec!["2024-01-01".to_string(), "2024-01-02".to_string()]
        );
    }

    #[test]
    fn csv_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        std::fs::write(&path, "date,value\n2024-01-01,1.0\n").unwrap();

        let err = load_series(&path, "price", None).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(c) if c == "price"));
    }

    #[test]
    fn csv_non_numeric_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        std::fs::write(&path, "value\n1.0\nnot-a-number\n").unwrap();

        let err = load_series(&path, "value", None).unwrap_err();
        assert!(matches!(err, DataError::BadValue { row: 2, .. }));
    }

    #[test]
    fn json_number_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        std::fs::write(&path, "[1.0, 2.0, 3.5]").unwrap();

        let loaded = load_series(&path, "value", None).unwrap();
        assert_eq!(loaded.values, vec![1.0, 2.0, 3.5]);
        assert!(loaded.timestamps.is_none());
    }

    #[test]
    fn json_object_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.json");
        std::fs::write(
            &path,
            r#"[{"date": "2024-01-01", "price": 100.0}, {"date": "2024-01-02", "price": 101.5}]"#,
        )
        .unwrap();

        let loaded = load_series(&path, "price", Some("date")).unwrap();
        assert_eq!(loaded.values, vec![100.0, 101.5]);
        assert_eq!(loaded.timestamps.unwrap().len(), 2);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_series(Path::new("series.parquet"), "value", None).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedFormat(_)));
    }

    #[test]
    fn window_counts_and_boundaries() {
        // 0..=9: context 4, horizon 2, stride 2 -> starts at 0, 2, 4
        let windows = make_windows(&series(10), 4, 2, 2);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].context, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(windows[0].horizon, vec![4.0, 5.0]);
        assert_eq!(windows[2].start, 4);
        assert_eq!(windows[2].horizon, vec![8.0, 9.0]);
    }

    #[test]
    fn too_short_series_yields_no_windows() {
        assert!(make_windows(&series(5), 4, 2, 2).is_empty());
        assert!(make_windows(&series(10), 0, 2, 2).is_empty());
    }

    #[test]
    fn tail_split_takes_the_last_points() {
        let window = tail_split(&series(10), 4, 3).unwrap();
        assert_eq!(window.context, vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(window.horizon, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn tail_split_clamps_short_context() {
        let window = tail_split(&series(5), 100, 2).unwrap();
        assert_eq!(window.context, vec![0.0, 1.0, 2.0]);
        assert_eq!(window.horizon, vec![3.0, 4.0]);
    }

    #[test]
    fn tail_split_rejects_holdout_of_everything() {
        assert!(tail_split(&series(3), 4, 3).is_none());
        assert!(tail_split(&series(3), 4, 5).is_none());
    }
}
