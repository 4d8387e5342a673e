use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnomalyError {
    #[error("length mismatch: observed {observed}, lower {lower}, upper {upper}")]
    LengthMismatch {
        observed: usize,
        lower: usize,
        upper: usize,
    },
}

/// Per-point anomaly mask over an observed horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyReport {
    pub is_anomaly: Vec<bool>,
}

impl AnomalyReport {
    /// Indices of flagged points.
    pub fn indices(&self) -> Vec<usize> {
        self.is_anomaly
            .iter()
            .enumerate()
            .filter_map(|(i, &flagged)| flagged.then_some(i))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.is_anomaly.iter().filter(|&&f| f).count()
    }
}

/// Flag every observed point falling outside the `[lower, upper]` band.
pub fn flag_outliers(
    observed: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> Result<AnomalyReport, AnomalyError> {
    if observed.len() != lower.len() || observed.len() != upper.len() {
        return Err(AnomalyError::LengthMismatch {
            observed: observed.len(),
            lower: lower.len(),
            upper: upper.len(),
        });
    }
    let is_anomaly = observed
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(&obs, (&lo, &hi))| obs < lo || obs > hi)
        .collect();
    Ok(AnomalyReport { is_anomaly })
}

/// Fixed-margin band around a point forecast: `point[i] ± margin`.
pub fn band_from_margin(point: &[f64], margin: f64) -> (Vec<f64>, Vec<f64>) {
    let lower = point.iter().map(|&p| p - margin).collect();
    let upper = point.iter().map(|&p| p + margin).collect();
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_band_flags_only_the_outlier() {
        let observed = [4.0, 5.0, 50.0];
        let point = [4.0, 5.0, 6.0];
        let (lower, upper) = band_from_margin(&point, 2.0);

        let report = flag_outliers(&observed, &lower, &upper).unwrap();
        assert_eq!(report.indices(), vec![2]);
        assert_eq!(report.count(), 1);
    }

    #[test]
    fn points_on_the_bound_are_not_anomalies() {
        let report = flag_outliers(&[2.0, 6.0], &[2.0, 2.0], &[6.0, 6.0]).unwrap();
        assert_eq!(report.count(), 0);
    }

    #[test]
    fn quantile_band() {
        let observed = [3.5, 10.0, 4.9];
        let lower = [3.0, 4.0, 5.0];
        let upper = [5.0, 6.0, 7.0];
        let report = flag_outliers(&observed, &lower, &upper).unwrap();
        assert_eq!(report.indices(), vec![1, 2]);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = flag_outliers(&[1.0, 2.0], &[0.0], &[3.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            AnomalyError::LengthMismatch {
                observed: 2,
                lower: 1,
                upper: 2,
            }
        );
    }
}
