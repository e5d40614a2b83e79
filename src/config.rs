//! Per-analyte configuration.
//!
//! The engine owns no file format: an [`AnalyteConfig`] is deserialized with
//! serde by whatever loads the laboratory's settings, then validated before
//! any measurement is accepted. Omitted tuning fields take the defaults
//! below.

use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};
use crate::spc::WestgardRule;

/// Default number of measurements kept in the working window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;
/// Default CUSUM reference value, in multiples of σ.
pub const DEFAULT_CUSUM_K: f64 = 0.5;
/// Default CUSUM decision interval, in multiples of σ.
pub const DEFAULT_CUSUM_H: f64 = 4.0;
/// Default EWMA smoothing constant.
pub const DEFAULT_EWMA_LAMBDA: f64 = 0.2;
/// Default EWMA control-limit width, in multiples of the EWMA σ.
pub const DEFAULT_EWMA_L: f64 = 2.7;
/// Default modified z-score outlier threshold.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 3.5;
/// Default number of points for the drift regression.
pub const DEFAULT_TREND_WINDOW: usize = 10;
/// Default number of violations retained in an analyte's log.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Target statistics for one control material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteProfile {
    pub analyte_id: String,
    /// Expected control value.
    pub target_mean: f64,
    /// Expected standard deviation; must be positive.
    pub target_std: f64,
    /// Total allowable error, percent of target; must be positive.
    pub tea_pct: f64,
}

impl AnalyteProfile {
    /// Creates a validated profile.
    ///
    /// # Errors
    ///
    /// [`QcError::InvalidConfig`] for an empty id, a non-finite mean, or a
    /// non-positive `target_std` / `tea_pct`.
    pub fn new(
        analyte_id: impl Into<String>,
        target_mean: f64,
        target_std: f64,
        tea_pct: f64,
    ) -> Result<Self> {
        let profile = Self {
            analyte_id: analyte_id.into(),
            target_mean,
            target_std,
            tea_pct,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analyte_id.trim().is_empty() {
            return Err(QcError::config("analyte_id", "must not be empty"));
        }
        if !self.target_mean.is_finite() {
            return Err(QcError::config("target_mean", "must be finite"));
        }
        if !self.target_std.is_finite() || self.target_std <= 0.0 {
            return Err(QcError::config(
                "target_std",
                format!("must be positive and finite, got {}", self.target_std),
            ));
        }
        if !self.tea_pct.is_finite() || self.tea_pct <= 0.0 {
            return Err(QcError::config(
                "tea_pct",
                format!("must be positive and finite, got {}", self.tea_pct),
            ));
        }
        Ok(())
    }

    /// Standardized distance of `value` from target.
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.target_mean) / self.target_std
    }
}

/// Full monitoring configuration for one analyte.
///
/// # Examples
///
/// ```
/// use u_labqc::config::AnalyteConfig;
///
/// let json = r#"{
///     "profile": { "analyte_id": "urea", "target_mean": 25.0, "target_std": 1.5, "tea_pct": 9.0 },
///     "ewma_lambda": 0.1
/// }"#;
/// let config: AnalyteConfig = serde_json::from_str(json).unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.window_capacity, 100);
/// assert!((config.ewma_lambda - 0.1).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyteConfig {
    pub profile: AnalyteProfile,
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// CUSUM reference value k, in multiples of σ.
    #[serde(default = "default_cusum_k")]
    pub cusum_k: f64,
    /// CUSUM decision interval h, in multiples of σ.
    #[serde(default = "default_cusum_h")]
    pub cusum_h: f64,
    #[serde(default = "default_ewma_lambda")]
    pub ewma_lambda: f64,
    /// EWMA limit width L.
    #[serde(default = "default_ewma_l", rename = "ewma_L", alias = "ewma_l")]
    pub ewma_l: f64,
    /// |modified z| above which the latest point is an outlier.
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,
    /// Points used by the drift regression, and the minimum window length
    /// for both the drift and outlier checks.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Enabled Westgard rules.
    #[serde(default = "default_rules")]
    pub rules: Vec<WestgardRule>,
    /// Violations retained in the analyte's rolling log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}
fn default_cusum_k() -> f64 {
    DEFAULT_CUSUM_K
}
fn default_cusum_h() -> f64 {
    DEFAULT_CUSUM_H
}
fn default_ewma_lambda() -> f64 {
    DEFAULT_EWMA_LAMBDA
}
fn default_ewma_l() -> f64 {
    DEFAULT_EWMA_L
}
fn default_anomaly_threshold() -> f64 {
    DEFAULT_ANOMALY_THRESHOLD
}
fn default_trend_window() -> usize {
    DEFAULT_TREND_WINDOW
}
fn default_rules() -> Vec<WestgardRule> {
    WestgardRule::ALL.to_vec()
}
fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl AnalyteConfig {
    /// Configuration with every tuning parameter at its default.
    pub fn new(profile: AnalyteProfile) -> Self {
        Self {
            profile,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            cusum_k: DEFAULT_CUSUM_K,
            cusum_h: DEFAULT_CUSUM_H,
            ewma_lambda: DEFAULT_EWMA_LAMBDA,
            ewma_l: DEFAULT_EWMA_L,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            trend_window: DEFAULT_TREND_WINDOW,
            rules: default_rules(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    pub fn analyte_id(&self) -> &str {
        &self.profile.analyte_id
    }

    /// Rejects any parameter outside its domain.
    ///
    /// # Errors
    ///
    /// [`QcError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        if self.window_capacity == 0 {
            return Err(QcError::config("window_capacity", "must be at least 1"));
        }
        if !self.cusum_k.is_finite() || self.cusum_k < 0.0 {
            return Err(QcError::config("cusum_k", "must be non-negative and finite"));
        }
        if !self.cusum_h.is_finite() || self.cusum_h <= 0.0 {
            return Err(QcError::config("cusum_h", "must be positive and finite"));
        }
        if !self.ewma_lambda.is_finite() || self.ewma_lambda <= 0.0 || self.ewma_lambda > 1.0 {
            return Err(QcError::config("ewma_lambda", "must be in (0, 1]"));
        }
        if !self.ewma_l.is_finite() || self.ewma_l <= 0.0 {
            return Err(QcError::config("ewma_L", "must be positive and finite"));
        }
        if !self.anomaly_threshold.is_finite() || self.anomaly_threshold <= 0.0 {
            return Err(QcError::config(
                "anomaly_threshold",
                "must be positive and finite",
            ));
        }
        if self.trend_window < 3 {
            return Err(QcError::config(
                "trend_window",
                format!("needs at least 3 points, got {}", self.trend_window),
            ));
        }
        if self.trend_window > self.window_capacity {
            return Err(QcError::config(
                "trend_window",
                format!(
                    "{} exceeds window_capacity {}",
                    self.trend_window, self.window_capacity
                ),
            ));
        }
        if self.log_capacity == 0 {
            return Err(QcError::config("log_capacity", "must be at least 1"));
        }
        Ok(())
    }
}
