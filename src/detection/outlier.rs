//! Robust outlier detection with the modified z-score.
//!
//! ```text
//! M_i = 0.6745 * (x_i - median) / MAD,    MAD = median(|x_j - median|)
//! ```
//!
//! Median and MAD are insensitive to the outlier itself, unlike mean and
//! standard deviation. When more than half the window is identical the MAD
//! collapses to zero and the test is reported as inconclusive.
//!
//! # Reference
//!
//! Iglewicz, B. & Hoaglin, D.C. (1993). *How to Detect and Handle Outliers*,
//! ASQC Basic References in Quality Control, vol. 16.

use tracing::debug;
use u_numflow::stats;

use crate::spc::{
    CheckKind, CheckOutcome, InconclusiveCheck, MeasurementWindow, RuleId, Severity, Violation,
};

/// Consistency constant: 0.6745 ≈ Φ⁻¹(0.75).
const CONSISTENCY: f64 = 0.6745;
/// |M| above which an outlier is critical rather than a warning.
const CRITICAL_SCORE: f64 = 4.5;

/// Modified z-scores of `data`, or `None` if empty or MAD is zero.
///
/// # Examples
///
/// ```
/// use u_labqc::detection::modified_z_scores;
///
/// let scores = modified_z_scores(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
/// assert!(scores[4] > 3.5);
/// assert!(modified_z_scores(&[5.0, 5.0, 5.0, 6.0]).is_none()); // MAD = 0
/// ```
pub fn modified_z_scores(data: &[f64]) -> Option<Vec<f64>> {
    let median = stats::median(data)?;
    let deviations: Vec<f64> = data.iter().map(|&x| (x - median).abs()).collect();
    let mad = stats::median(&deviations)?;
    if !mad.is_finite() || mad <= 0.0 {
        return None;
    }
    Some(
        data.iter()
            .map(|&x| CONSISTENCY * (x - median) / mad)
            .collect(),
    )
}

/// Modified z-score test of the latest point against the whole window.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierDetector {
    threshold: f64,
    min_points: usize,
}

impl OutlierDetector {
    /// # Returns
    ///
    /// `None` if `threshold` is not positive and finite or `min_points` is zero.
    pub fn new(threshold: f64, min_points: usize) -> Option<Self> {
        if !threshold.is_finite() || threshold <= 0.0 || min_points == 0 {
            return None;
        }
        Some(Self {
            threshold,
            min_points,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Runs the outlier test for the latest push.
    pub fn check(&self, window: &MeasurementWindow) -> CheckOutcome {
        let latest = match window.latest() {
            Some(m) if window.len() >= self.min_points => m,
            _ => return CheckOutcome::NotEvaluated,
        };

        let values = window.values();
        let score = match modified_z_scores(&values) {
            Some(scores) => scores[scores.len() - 1],
            None => {
                debug!(
                    analyte = %latest.analyte_id,
                    run_index = latest.run_index,
                    "outlier check skipped: MAD is zero"
                );
                return CheckOutcome::Inconclusive(InconclusiveCheck {
                    run_index: latest.run_index,
                    check: CheckKind::RobustOutlier,
                    reason: "median absolute deviation is zero".to_string(),
                });
            }
        };

        if score.abs() <= self.threshold {
            return CheckOutcome::Clear;
        }

        let severity = if score.abs() > CRITICAL_SCORE {
            Severity::Critical
        } else {
            Severity::Warning
        };
        CheckOutcome::Violation(Violation {
            analyte_id: latest.analyte_id.clone(),
            run_index: latest.run_index,
            rule_id: RuleId::Outlier,
            severity,
            description: format!("Statistical outlier (modified z = {score:.2})"),
            recommended_action: format!("{severity} - Outlier detected"),
            statistic: score,
        })
    }
}
