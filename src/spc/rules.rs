//! Westgard multi-rules for detecting analytical error in control runs.
//!
//! Every rule is a pure predicate over the z-scores of the last K
//! measurements. Rules are evaluated independently after each push, so a
//! single run can trigger several rules at once; all of them are reported.
//! A rule that needs K points is silently skipped while the window holds
//! fewer than K.
//!
//! All thresholds use strict comparison: `|z| == 2.0` does not exceed 2s.
//! Comparisons carry a tolerance of [`TIE_TOLERANCE`] so a measurement
//! sitting exactly on a limit stays on it after floating-point division,
//! whichever side of the target it lies on.
//!
//! # References
//!
//! - Westgard, J.O., Barry, P.L., Hunt, M.R., Groth, T. (1981). "A Multi-Rule
//!   Shewhart Chart for Quality Control in Clinical Chemistry",
//!   *Clinical Chemistry* 27(3), pp. 493-501.
//! - Westgard, J.O. (2002). *Basic QC Practices*, 2nd ed., Westgard QC.

use serde::{Deserialize, Serialize};

use super::chart::{RuleId, Severity, Violation};
use super::window::MeasurementWindow;
use crate::config::AnalyteProfile;

/// Trait for applying a set of run rules to a measurement window.
///
/// Implementations inspect the window as it stands after the latest push and
/// report violations attributed to the latest run.
pub trait RunRule {
    /// Check the window and return every violation triggered by its latest point.
    fn check(&self, window: &MeasurementWindow, profile: &AnalyteProfile) -> Vec<Violation>;
}

/// One Westgard rule.
///
/// Serialized by its conventional short name (`"1-3s"`, `"10-x"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WestgardRule {
    /// Latest |z| > 2 (warning rule).
    #[serde(rename = "1-2s")]
    OneTwoS,
    /// Latest |z| > 3.
    #[serde(rename = "1-3s")]
    OneThreeS,
    /// Last 2 beyond 2s on the same side.
    #[serde(rename = "2-2s")]
    TwoTwoS,
    /// 2 of the last 3 beyond 2s on the same side.
    #[serde(rename = "2-3s")]
    TwoOfThreeTwoS,
    /// Range between the last 2 exceeds 4s.
    #[serde(rename = "R-4s")]
    RFourS,
    /// Last 3 beyond 1s on the same side.
    #[serde(rename = "3-1s")]
    ThreeOneS,
    /// Last 4 beyond 1s on the same side.
    #[serde(rename = "4-1s")]
    FourOneS,
    /// Last 6 on the same side of the mean.
    #[serde(rename = "6-x")]
    SixX,
    /// At least 6 of the last 7 on the same side of the mean.
    #[serde(rename = "6/7-x")]
    SixOfSevenX,
    /// Last 7 steadily increasing or decreasing.
    #[serde(rename = "7-T")]
    SevenT,
    /// Last 8 outside the ±1s band (either side).
    #[serde(rename = "8-x")]
    EightX,
    /// Last 8 alternating up and down.
    #[serde(rename = "8-alt")]
    EightAlternating,
    /// Last 9 on the same side of the mean.
    #[serde(rename = "9-x")]
    NineX,
    /// Last 10 on the same side of the mean.
    #[serde(rename = "10-x")]
    TenX,
    /// Last 12 on the same side of the mean.
    #[serde(rename = "12-x")]
    TwelveX,
}

impl WestgardRule {
    /// Every rule, in evaluation order.
    pub const ALL: [WestgardRule; 15] = [
        WestgardRule::OneTwoS,
        WestgardRule::OneThreeS,
        WestgardRule::TwoTwoS,
        WestgardRule::TwoOfThreeTwoS,
        WestgardRule::RFourS,
        WestgardRule::ThreeOneS,
        WestgardRule::FourOneS,
        WestgardRule::SixX,
        WestgardRule::SixOfSevenX,
        WestgardRule::SevenT,
        WestgardRule::EightX,
        WestgardRule::EightAlternating,
        WestgardRule::NineX,
        WestgardRule::TenX,
        WestgardRule::TwelveX,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            WestgardRule::OneTwoS => "1-2s",
            WestgardRule::OneThreeS => "1-3s",
            WestgardRule::TwoTwoS => "2-2s",
            WestgardRule::TwoOfThreeTwoS => "2-3s",
            WestgardRule::RFourS => "R-4s",
            WestgardRule::ThreeOneS => "3-1s",
            WestgardRule::FourOneS => "4-1s",
            WestgardRule::SixX => "6-x",
            WestgardRule::SixOfSevenX => "6/7-x",
            WestgardRule::SevenT => "7-T",
            WestgardRule::EightX => "8-x",
            WestgardRule::EightAlternating => "8-alt",
            WestgardRule::NineX => "9-x",
            WestgardRule::TenX => "10-x",
            WestgardRule::TwelveX => "12-x",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WestgardRule::OneThreeS
            | WestgardRule::TwoTwoS
            | WestgardRule::RFourS
            | WestgardRule::FourOneS
            | WestgardRule::TenX
            | WestgardRule::TwelveX => Severity::Critical,
            WestgardRule::OneTwoS
            | WestgardRule::TwoOfThreeTwoS
            | WestgardRule::ThreeOneS
            | WestgardRule::SixX
            | WestgardRule::SixOfSevenX
            | WestgardRule::SevenT
            | WestgardRule::EightX
            | WestgardRule::EightAlternating
            | WestgardRule::NineX => Severity::Warning,
        }
    }

    /// Number of consecutive points the rule looks at.
    pub fn required_points(&self) -> usize {
        match self {
            WestgardRule::OneTwoS | WestgardRule::OneThreeS => 1,
            WestgardRule::TwoTwoS | WestgardRule::RFourS => 2,
            WestgardRule::TwoOfThreeTwoS | WestgardRule::ThreeOneS => 3,
            WestgardRule::FourOneS => 4,
            WestgardRule::SixX => 6,
            WestgardRule::SixOfSevenX | WestgardRule::SevenT => 7,
            WestgardRule::EightX | WestgardRule::EightAlternating => 8,
            WestgardRule::NineX => 9,
            WestgardRule::TenX => 10,
            WestgardRule::TwelveX => 12,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WestgardRule::OneTwoS => "Single value exceeds ±2 SD",
            WestgardRule::OneThreeS => "Single value exceeds ±3 SD",
            WestgardRule::TwoTwoS => "Two consecutive values exceed ±2 SD on the same side",
            WestgardRule::TwoOfThreeTwoS => "Two of three values exceed ±2 SD on the same side",
            WestgardRule::RFourS => "Range between consecutive values exceeds 4 SD",
            WestgardRule::ThreeOneS => "Three consecutive values exceed ±1 SD on the same side",
            WestgardRule::FourOneS => "Four consecutive values exceed ±1 SD on the same side",
            WestgardRule::SixX => "Six consecutive values on the same side of the mean",
            WestgardRule::SixOfSevenX => "Six of seven values on the same side of the mean",
            WestgardRule::SevenT => "Seven consecutive values trending in one direction",
            WestgardRule::EightX => "Eight consecutive values avoid the ±1 SD band",
            WestgardRule::EightAlternating => "Eight consecutive values alternating up and down",
            WestgardRule::NineX => "Nine consecutive values on the same side of the mean",
            WestgardRule::TenX => "Ten consecutive values on the same side of the mean",
            WestgardRule::TwelveX => "Twelve consecutive values on the same side of the mean",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            WestgardRule::OneTwoS => "WARNING - Inspect remaining rules before accepting run",
            WestgardRule::OneThreeS => "REJECT run - Random error",
            WestgardRule::TwoTwoS => "REJECT run - Systematic error",
            WestgardRule::TwoOfThreeTwoS => "WARNING - Possible systematic error",
            WestgardRule::RFourS => "REJECT run - High random error",
            WestgardRule::ThreeOneS => "WARNING - Developing systematic shift",
            WestgardRule::FourOneS => "REJECT run - Systematic shift",
            WestgardRule::SixX => "WARNING - Possible bias",
            WestgardRule::SixOfSevenX => "WARNING - Potential bias",
            WestgardRule::SevenT => "WARNING - Systematic trend",
            WestgardRule::EightX => "WARNING - Increased variability",
            WestgardRule::EightAlternating => "WARNING - Check for systematic variation",
            WestgardRule::NineX => "WARNING - Sustained bias",
            WestgardRule::TenX => "REJECT run - Systematic bias",
            WestgardRule::TwelveX => "REJECT run - Persistent systematic bias",
        }
    }

    /// Applies the rule to exactly `required_points()` z-scores, oldest first.
    ///
    /// Returns `false` for a slice of any other length.
    pub fn check(&self, z: &[f64]) -> bool {
        if z.len() != self.required_points() {
            return false;
        }
        let last = z[z.len() - 1];
        match self {
            WestgardRule::OneTwoS => exceeds(last.abs(), 2.0),
            WestgardRule::OneThreeS => exceeds(last.abs(), 3.0),
            WestgardRule::TwoTwoS | WestgardRule::ThreeOneS | WestgardRule::FourOneS => {
                let limit = if *self == WestgardRule::TwoTwoS { 2.0 } else { 1.0 };
                all_beyond_same_side(z, limit)
            }
            WestgardRule::TwoOfThreeTwoS => at_least_beyond_same_side(z, 2.0, 2),
            WestgardRule::RFourS => exceeds((last - z[0]).abs(), 4.0),
            WestgardRule::SixOfSevenX => at_least_beyond_same_side(z, 0.0, 6),
            WestgardRule::SevenT => {
                z.windows(2).all(|w| w[1] > w[0]) || z.windows(2).all(|w| w[1] < w[0])
            }
            WestgardRule::EightX => z.iter().all(|v| exceeds(v.abs(), 1.0)),
            WestgardRule::EightAlternating => alternating(z),
            WestgardRule::SixX
            | WestgardRule::NineX
            | WestgardRule::TenX
            | WestgardRule::TwelveX => all_beyond_same_side(z, 0.0),
        }
    }

    /// The statistic reported with a violation of this rule.
    fn statistic(&self, z: &[f64]) -> f64 {
        let last = z[z.len() - 1];
        match self {
            WestgardRule::RFourS => last - z[0],
            _ => last,
        }
    }
}

/// Slack absorbed by every limit comparison, in z units.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// `v` is strictly past `limit` by more than [`TIE_TOLERANCE`].
fn exceeds(v: f64, limit: f64) -> bool {
    v > limit + TIE_TOLERANCE
}

/// Every value beyond `+limit`, or every value beyond `-limit`.
fn all_beyond_same_side(z: &[f64], limit: f64) -> bool {
    z.iter().all(|&v| exceeds(v, limit)) || z.iter().all(|&v| exceeds(-v, limit))
}

/// At least `count` values beyond `+limit`, or at least `count` beyond `-limit`.
fn at_least_beyond_same_side(z: &[f64], limit: f64, count: usize) -> bool {
    let above = z.iter().filter(|&&v| exceeds(v, limit)).count();
    let below = z.iter().filter(|&&v| exceeds(-v, limit)).count();
    above >= count || below >= count
}

/// Every step changes direction; a flat step breaks the pattern.
fn alternating(z: &[f64]) -> bool {
    let dirs: Vec<i8> = z
        .windows(2)
        .map(|w| {
            if w[1] > w[0] {
                1
            } else if w[1] < w[0] {
                -1
            } else {
                0
            }
        })
        .collect();
    dirs.iter().all(|&d| d != 0) && dirs.windows(2).all(|d| d[1] == -d[0])
}

/// A configurable subset of the Westgard rules.
///
/// # Examples
///
/// ```
/// use u_labqc::config::AnalyteProfile;
/// use u_labqc::spc::{Measurement, MeasurementWindow, RunRule, WestgardRules};
///
/// let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).unwrap();
/// let mut window = MeasurementWindow::new("creatinine", 100).unwrap();
/// window.push(Measurement::new("creatinine", 1, 1.175)).unwrap();
///
/// let violations = WestgardRules::all().check(&window, &profile);
/// let ids: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
/// assert_eq!(ids, vec!["1-2s", "1-3s"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WestgardRules {
    rules: Vec<WestgardRule>,
}

impl WestgardRules {
    /// The full rule table.
    pub fn all() -> Self {
        Self::new(WestgardRule::ALL.to_vec())
    }

    /// A custom rule set; duplicates are dropped, order is preserved.
    pub fn new(rules: Vec<WestgardRule>) -> Self {
        let mut unique = Vec::with_capacity(rules.len());
        for rule in rules {
            if !unique.contains(&rule) {
                unique.push(rule);
            }
        }
        Self { rules: unique }
    }

    pub fn rules(&self) -> &[WestgardRule] {
        &self.rules
    }

    /// Longest look-back among the enabled rules.
    pub fn max_required_points(&self) -> usize {
        self.rules
            .iter()
            .map(WestgardRule::required_points)
            .max()
            .unwrap_or(0)
    }
}

impl Default for WestgardRules {
    fn default() -> Self {
        Self::all()
    }
}

impl RunRule for WestgardRules {
    /// Z-scores are computed once for the longest look-back, then each
    /// enabled rule is handed the suffix it needs.
    ///
    /// # Complexity
    ///
    /// Time: O(r · k) for r rules with look-back at most k
    fn check(&self, window: &MeasurementWindow, profile: &AnalyteProfile) -> Vec<Violation> {
        let latest = match window.latest() {
            Some(m) => m,
            None => return Vec::new(),
        };

        let span = self.max_required_points().min(window.len());
        let z: Vec<f64> = window
            .iter()
            .skip(window.len() - span)
            .map(|m| profile.z_score(m.value))
            .collect();

        let mut violations = Vec::new();
        for rule in &self.rules {
            let k = rule.required_points();
            if k > z.len() {
                continue;
            }
            let tail = &z[z.len() - k..];
            if rule.check(tail) {
                let statistic = rule.statistic(tail);
                violations.push(Violation {
                    analyte_id: latest.analyte_id.clone(),
                    run_index: latest.run_index,
                    rule_id: RuleId::Westgard(*rule),
                    severity: rule.severity(),
                    description: format!("{} (z = {:.2})", rule.description(), z[z.len() - 1]),
                    recommended_action: rule.recommended_action().to_string(),
                    statistic,
                });
            }
        }
        violations
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::spc::chart::Measurement;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rules_never_fire_before_enough_history(
            z in proptest::collection::vec(-5.0_f64..5.0, 1..30),
        ) {
            let profile = AnalyteProfile::new("x", 0.0, 1.0, 10.0).expect("valid profile");
            let mut w = MeasurementWindow::new("x", 100).expect("valid capacity");
            for (i, &zi) in z.iter().enumerate() {
                w.push(Measurement::new("x", i as u64, zi)).expect("in order");
                for v in WestgardRules::all().check(&w, &profile) {
                    if let RuleId::Westgard(rule) = v.rule_id {
                        prop_assert!(rule.required_points() <= w.len(),
                            "{} fired with {} points", rule.id(), w.len());
                    }
                }
            }
        }
    }
}
