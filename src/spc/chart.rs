//! Core Levey-Jennings chart types.
//!
//! Defines the measurement fed into the engine and the violation records the
//! detectors emit: severity, rule identifiers, and checks that could not be
//! completed.
//!
//! # References
//!
//! - Westgard, J.O. et al. (1981). "A Multi-Rule Shewhart Chart for Quality
//!   Control in Clinical Chemistry", *Clinical Chemistry* 27(3), pp. 493-501.
//! - Levey, S. & Jennings, E.R. (1950). "The use of control charts in the
//!   clinical laboratory", *Am. J. Clin. Pathol.* 20(11).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::rules::WestgardRule;

/// A single control measurement for one analyte.
///
/// Immutable once created. `run_index` orders measurements within an
/// analyte's stream and must be strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Analyte this control belongs to.
    pub analyte_id: String,
    /// Position in the analyte's run sequence.
    pub run_index: u64,
    /// Acquisition time.
    pub timestamp: DateTime<Utc>,
    /// Measured value in the analyte's units.
    pub value: f64,
}

impl Measurement {
    /// Creates a measurement stamped with the current time.
    pub fn new(analyte_id: impl Into<String>, run_index: u64, value: f64) -> Self {
        Self::with_timestamp(analyte_id, run_index, Utc::now(), value)
    }

    pub fn with_timestamp(
        analyte_id: impl Into<String>,
        run_index: u64,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            analyte_id: analyte_id.into(),
            run_index,
            timestamp,
            value,
        }
    }
}

/// Severity of a violation.
///
/// Ordered so that `Critical > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Investigate; the run may be accepted.
    Warning,
    /// Reject the run.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Identifier of the rule or detector that produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    /// A Westgard multi-rule.
    Westgard(WestgardRule),
    /// Upper CUSUM crossed the decision interval.
    CusumUpper,
    /// Lower CUSUM crossed the decision interval.
    CusumLower,
    /// EWMA above its upper control limit.
    EwmaUpper,
    /// EWMA below its lower control limit.
    EwmaLower,
    /// Significant upward drift.
    TrendUp,
    /// Significant downward drift.
    TrendDown,
    /// Robust (modified z-score) outlier.
    Outlier,
}

impl RuleId {
    /// Stable short identifier, e.g. `"1-3s"` or `"CUSUM+"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Westgard(rule) => rule.id(),
            RuleId::CusumUpper => "CUSUM+",
            RuleId::CusumLower => "CUSUM-",
            RuleId::EwmaUpper => "EWMA-H",
            RuleId::EwmaLower => "EWMA-L",
            RuleId::TrendUp => "TREND-UP",
            RuleId::TrendDown => "TREND-DOWN",
            RuleId::Outlier => "MOD-Z",
        }
    }

    /// Name of the detection method that owns this rule.
    pub fn method(&self) -> &'static str {
        match self {
            RuleId::Westgard(_) => "Westgard",
            RuleId::CusumUpper | RuleId::CusumLower => "CUSUM",
            RuleId::EwmaUpper | RuleId::EwmaLower => "EWMA",
            RuleId::TrendUp | RuleId::TrendDown => "Trend",
            RuleId::Outlier => "Anomaly",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A violation detected at one run.
///
/// Created by a detector and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Analyte the violation belongs to.
    pub analyte_id: String,
    /// Run index of the measurement that triggered it.
    pub run_index: u64,
    /// Which rule fired.
    pub rule_id: RuleId,
    pub severity: Severity,
    /// Human-readable description of the pattern.
    pub description: String,
    /// What the operator should do.
    pub recommended_action: String,
    /// The statistic that crossed its threshold (z-score, cumulative sum,
    /// smoothed value, change in σ units, or modified z-score).
    pub statistic: f64,
}

/// A check that produced neither a violation nor a clean pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CheckKind {
    /// Modified z-score outlier test.
    RobustOutlier,
    /// OLS drift test.
    LinearTrend,
}

/// A check skipped because a statistic it divides by collapsed to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InconclusiveCheck {
    pub run_index: u64,
    pub check: CheckKind,
    pub reason: String,
}

/// Outcome of a window-level check on the latest push.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Too little history; the check did not run.
    NotEvaluated,
    /// Ran and found nothing.
    Clear,
    Violation(Violation),
    Inconclusive(InconclusiveCheck),
}

impl CheckOutcome {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            CheckOutcome::Violation(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_construction() {
        let m = Measurement::new("urea", 3, 25.4);
        assert_eq!(m.analyte_id, "urea");
        assert_eq!(m.run_index, 3);
        assert!((m.value - 25.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_rule_id_strings() {
        assert_eq!(RuleId::Westgard(WestgardRule::OneThreeS).as_str(), "1-3s");
        assert_eq!(RuleId::CusumUpper.to_string(), "CUSUM+");
        assert_eq!(RuleId::Outlier.method(), "Anomaly");
        assert_eq!(RuleId::Westgard(WestgardRule::TenX).method(), "Westgard");
    }

    #[test]
    fn test_violation_serializes_rule_as_string() {
        let v = Violation {
            analyte_id: "creatinine".into(),
            run_index: 12,
            rule_id: RuleId::Westgard(WestgardRule::TwoTwoS),
            severity: Severity::Critical,
            description: "two in a row".into(),
            recommended_action: "reject".into(),
            statistic: 2.4,
        };
        let json = serde_json::to_value(&v).expect("serializable");
        assert_eq!(json["rule_id"], "2-2s");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["run_index"], 12);
    }
}
