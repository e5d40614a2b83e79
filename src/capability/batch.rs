//! Bias and imprecision of a batch of control results.

use serde::Serialize;
use u_numflow::stats;

use super::sigma_metric::{classify_sigma, SigmaMetric};
use crate::error::{QcError, Result};

/// Mean, spread, CV% and Bias% of a batch against its target.
///
/// # Examples
///
/// ```
/// use u_labqc::capability::BatchStatistics;
///
/// let batch = BatchStatistics::from_values(&[0.98, 1.02, 1.00, 1.04, 0.96], 1.0).unwrap();
/// assert!((batch.mean - 1.0).abs() < 1e-12);
/// assert!(batch.bias_pct.abs() < 1e-9);
/// assert!(batch.cv_pct > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    /// Coefficient of variation, percent of |mean|.
    pub cv_pct: f64,
    /// `mean - target`.
    pub bias: f64,
    /// Bias as a percent of target; signed.
    pub bias_pct: f64,
}

impl BatchStatistics {
    /// # Errors
    ///
    /// - [`QcError::InvalidInput`] for fewer than two values, or any
    ///   non-finite value or target.
    /// - [`QcError::DegenerateStatistics`] when the batch mean or the target
    ///   is zero (CV% or Bias% undefined).
    pub fn from_values(values: &[f64], target_mean: f64) -> Result<Self> {
        if values.len() < 2 {
            return Err(QcError::input(
                "values",
                format!("need at least 2 values, got {}", values.len()),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(QcError::input("values", "must all be finite"));
        }
        if !target_mean.is_finite() {
            return Err(QcError::input("target_mean", "must be finite"));
        }
        if target_mean == 0.0 {
            return Err(QcError::degenerate("batch statistics", "target mean is zero"));
        }

        let (mean, std_dev) = match (stats::mean(values), stats::std_dev(values)) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(QcError::degenerate("batch statistics", "mean or SD undefined")),
        };
        if mean == 0.0 {
            return Err(QcError::degenerate("batch statistics", "batch mean is zero"));
        }

        let bias = mean - target_mean;
        Ok(Self {
            n: values.len(),
            mean,
            std_dev,
            cv_pct: std_dev / mean.abs() * 100.0,
            bias,
            bias_pct: bias / target_mean * 100.0,
        })
    }

    /// Sigma metric of this batch for an analyte with total allowable error
    /// `tea_pct`.
    ///
    /// # Errors
    ///
    /// As [`classify_sigma`]; a batch of identical values has CV = 0 and is
    /// degenerate.
    pub fn classify(&self, tea_pct: f64) -> Result<SigmaMetric> {
        classify_sigma(tea_pct, self.bias_pct, self.cv_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::QualityTier;

    #[test]
    fn test_known_batch() {
        // mean 1.02, deviations ±0.02, ±0.04, 0 -> SS = 0.004, SD = sqrt(0.001)
        let b = BatchStatistics::from_values(&[1.00, 1.04, 1.02, 0.98, 1.06], 1.0)
            .expect("valid batch");
        assert_eq!(b.n, 5);
        assert!((b.mean - 1.02).abs() < 1e-12);
        assert!((b.std_dev - 0.001_f64.sqrt()).abs() < 1e-9);
        assert!((b.bias - 0.02).abs() < 1e-12);
        assert!((b.bias_pct - 2.0).abs() < 1e-9);
        assert!((b.cv_pct - 0.001_f64.sqrt() / 1.02 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_bias() {
        let b = BatchStatistics::from_values(&[24.0, 24.5, 23.5], 25.0).expect("valid batch");
        assert!((b.bias_pct + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_classify_batch() {
        // CV ~3.1%, bias 2% against TEa 15% -> sigma ~4.2
        let b = BatchStatistics::from_values(&[1.00, 1.04, 1.02, 0.98, 1.06], 1.0)
            .expect("valid batch");
        let m = b.classify(15.0).expect("non-degenerate");
        assert!((m.sigma - 13.0 / b.cv_pct).abs() < 1e-9);
        assert_eq!(m.tier, QualityTier::Good);
    }

    #[test]
    fn test_identical_values_cannot_be_classified() {
        let b = BatchStatistics::from_values(&[1.0, 1.0, 1.0], 1.0).expect("valid batch");
        assert!(b.cv_pct.abs() < 1e-15);
        assert!(matches!(
            b.classify(15.0),
            Err(QcError::DegenerateStatistics { .. })
        ));
    }

    #[test]
    fn test_rejects_short_or_degenerate_batches() {
        assert!(matches!(
            BatchStatistics::from_values(&[1.0], 1.0),
            Err(QcError::InvalidInput { field: "values", .. })
        ));
        assert!(matches!(
            BatchStatistics::from_values(&[1.0, f64::NAN], 1.0),
            Err(QcError::InvalidInput { .. })
        ));
        assert!(matches!(
            BatchStatistics::from_values(&[1.0, 1.1], 0.0),
            Err(QcError::DegenerateStatistics { .. })
        ));
        assert!(matches!(
            BatchStatistics::from_values(&[-1.0, 1.0], 1.0),
            Err(QcError::DegenerateStatistics { .. })
        ));
    }
}
