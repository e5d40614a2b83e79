//! Regression-based drift detection.
//!
//! Fits value against run index over the most recent points and flags a
//! systematic drift when the slope is statistically significant *and* the
//! change it predicts across the fitted range is large relative to sigma.
//! Significance alone is not enough: a tiny but very regular slope is not a
//! clinically relevant drift.
//!
//! # Algorithm
//!
//! ```text
//! value_i = b0 + b1 * run_i + e_i            (OLS over the last n points)
//! p       = two-sided t-test of H0: b1 = 0   (n - 2 d.f.)
//! change  = b1 * (run_last - run_first) / sigma
//! drift   = p < alpha  and  |change| > min_change
//! ```
//!
//! # Reference
//!
//! Westgard, J.O. (2002). *Basic QC Practices*, 2nd ed., ch. 12 (trend rules).

use tracing::debug;

use crate::regression::simple_linear_regression;
use crate::spc::{
    CheckKind, CheckOutcome, InconclusiveCheck, MeasurementWindow, RuleId, Severity, Violation,
};

/// Significance level of the slope test.
const ALPHA: f64 = 0.05;
/// Minimum predicted change, in sigma units, for a drift.
const MIN_CHANGE_SIGMA: f64 = 1.5;
/// Predicted change, in sigma units, from which a drift is critical.
const CRITICAL_CHANGE_SIGMA: f64 = 2.5;

/// Drift test over the last `points` measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendDetector {
    sigma: f64,
    points: usize,
}

/// Regression summary for the fitted range.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFit {
    /// Change in value per run.
    pub slope: f64,
    /// Two-sided p-value of the slope.
    pub p_value: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Predicted change across the fitted range, in sigma units.
    pub change_sigma: f64,
}

impl TrendDetector {
    /// # Returns
    ///
    /// `None` if `sigma` is not positive and finite or `points < 3`.
    pub fn new(sigma: f64, points: usize) -> Option<Self> {
        if !sigma.is_finite() || sigma <= 0.0 || points < 3 {
            return None;
        }
        Some(Self { sigma, points })
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// Fits the last `points` measurements, or `None` if the window holds fewer.
    pub fn fit(&self, window: &MeasurementWindow) -> Option<TrendFit> {
        let (x, y): (Vec<f64>, Vec<f64>) = window
            .tail(self.points)?
            .map(|m| (m.run_index as f64, m.value))
            .unzip();

        let reg = simple_linear_regression(&x, &y)?;
        let span = x[x.len() - 1] - x[0];
        Some(TrendFit {
            slope: reg.slope,
            p_value: reg.slope_p,
            r_squared: reg.r_squared,
            change_sigma: reg.slope * span / self.sigma,
        })
    }

    /// Runs the drift test for the latest push.
    pub fn check(&self, window: &MeasurementWindow) -> CheckOutcome {
        let latest = match window.latest() {
            Some(m) if window.len() >= self.points => m,
            _ => return CheckOutcome::NotEvaluated,
        };

        let fit = match self.fit(window) {
            Some(fit) => fit,
            None => {
                debug!(analyte = %latest.analyte_id, run_index = latest.run_index, "trend regression undefined");
                return CheckOutcome::Inconclusive(InconclusiveCheck {
                    run_index: latest.run_index,
                    check: CheckKind::LinearTrend,
                    reason: "regression undefined for the fitted range".to_string(),
                });
            }
        };

        if fit.p_value >= ALPHA || fit.change_sigma.abs() <= MIN_CHANGE_SIGMA {
            return CheckOutcome::Clear;
        }

        let severity = if fit.change_sigma.abs() >= CRITICAL_CHANGE_SIGMA {
            Severity::Critical
        } else {
            Severity::Warning
        };
        let (rule_id, direction) = if fit.slope > 0.0 {
            (RuleId::TrendUp, "upward")
        } else {
            (RuleId::TrendDown, "downward")
        };
        let prefix = match severity {
            Severity::Warning => "WARNING",
            Severity::Critical => "REJECT",
        };

        CheckOutcome::Violation(Violation {
            analyte_id: latest.analyte_id.clone(),
            run_index: latest.run_index,
            rule_id,
            severity,
            description: format!(
                "Systematic {direction} drift over {} runs (slope = {:.5}, R² = {:.3}, p = {:.4}, change = {:.2} SD)",
                self.points, fit.slope, fit.r_squared, fit.p_value, fit.change_sigma
            ),
            recommended_action: format!("{prefix} - Systematic {direction} drift"),
            statistic: fit.change_sigma,
        })
    }
}
