//! Six Sigma metric for analytical methods.
//!
//! ```text
//! Sigma = (TEa% - |Bias%|) / CV%
//! ```
//!
//! TEa is the total allowable error for the analyte; Bias and CV describe
//! the method's systematic and random error, all as percentages of target.
//!
//! # Reference
//!
//! Westgard, J.O. & Westgard, S.A. (2006). "The quality of laboratory testing
//! today: an assessment of sigma metrics for analytic quality using
//! performance data from proficiency testing surveys", *Am. J. Clin. Pathol.*
//! 125(3), pp. 343-354.

use std::fmt;

use serde::Serialize;

use super::sigma_level::sigma_to_dpm;
use crate::error::{QcError, Result};

/// Method performance band for a sigma metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QualityTier {
    /// Sigma < 3.
    Poor,
    /// 3 ≤ Sigma < 4.
    Marginal,
    /// 4 ≤ Sigma < 5.
    Good,
    /// 5 ≤ Sigma < 6.
    Excellent,
    /// Sigma ≥ 6.
    WorldClass,
}

impl QualityTier {
    /// Tier for a sigma value. Boundaries belong to the higher tier.
    pub fn from_sigma(sigma: f64) -> Self {
        if sigma >= 6.0 {
            QualityTier::WorldClass
        } else if sigma >= 5.0 {
            QualityTier::Excellent
        } else if sigma >= 4.0 {
            QualityTier::Good
        } else if sigma >= 3.0 {
            QualityTier::Marginal
        } else {
            QualityTier::Poor
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityTier::WorldClass => "World Class",
            QualityTier::Excellent => "Excellent",
            QualityTier::Good => "Good",
            QualityTier::Marginal => "Marginal",
            QualityTier::Poor => "Poor",
        };
        f.write_str(label)
    }
}

/// Result of [`classify_sigma`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigmaMetric {
    pub sigma: f64,
    pub tier: QualityTier,
    pub tea_pct: f64,
    pub bias_pct: f64,
    pub cv_pct: f64,
    /// Long-term defect rate implied by `sigma` (1.5σ shift convention).
    pub defects_per_million: f64,
}

/// Computes the sigma metric and its quality tier.
///
/// `bias_pct` may be negative; only its magnitude enters the metric. A bias
/// larger than TEa gives a negative sigma, which is classified `Poor`.
///
/// # Errors
///
/// - [`QcError::InvalidInput`] if any argument is non-finite, `tea_pct` is
///   not positive, or `cv_pct` is negative.
/// - [`QcError::DegenerateStatistics`] if `cv_pct` is zero.
///
/// # Examples
///
/// ```
/// use u_labqc::capability::{classify_sigma, QualityTier};
///
/// let metric = classify_sigma(15.0, 1.0, 5.0).unwrap();
/// assert!((metric.sigma - 2.8).abs() < 1e-12);
/// assert_eq!(metric.tier, QualityTier::Poor);
///
/// let metric = classify_sigma(15.0, 1.0, 2.0).unwrap();
/// assert_eq!(metric.tier, QualityTier::WorldClass);
/// ```
pub fn classify_sigma(tea_pct: f64, bias_pct: f64, cv_pct: f64) -> Result<SigmaMetric> {
    for (field, value) in [("tea_pct", tea_pct), ("bias_pct", bias_pct), ("cv_pct", cv_pct)] {
        if !value.is_finite() {
            return Err(QcError::input(field, format!("must be finite, got {value}")));
        }
    }
    if tea_pct <= 0.0 {
        return Err(QcError::input(
            "tea_pct",
            format!("must be positive, got {tea_pct}"),
        ));
    }
    if cv_pct < 0.0 {
        return Err(QcError::input(
            "cv_pct",
            format!("must not be negative, got {cv_pct}"),
        ));
    }
    if cv_pct == 0.0 {
        return Err(QcError::degenerate("sigma metric", "CV is zero"));
    }

    let sigma = (tea_pct - bias_pct.abs()) / cv_pct;
    Ok(SigmaMetric {
        sigma,
        tier: QualityTier::from_sigma(sigma),
        tea_pct,
        bias_pct,
        cv_pct,
        defects_per_million: sigma_to_dpm(sigma),
    })
}
