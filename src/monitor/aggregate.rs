//! Merging, ranking and summarising violations.
//!
//! Detectors know nothing about each other; this module turns their separate
//! outputs into one ordered report and keeps a short rolling history per
//! analyte.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::spc::{RuleId, Severity, Violation};

/// Merges violation batches into one ordered, de-duplicated list.
///
/// Ordered by run index, then severity (critical first), then rule id
/// string. When the same rule fires twice for the same run of the same
/// analyte, only the most severe instance is kept.
///
/// # Examples
///
/// ```
/// use u_labqc::monitor::aggregate;
/// use u_labqc::spc::{RuleId, Severity, Violation};
///
/// let v = |run, rule_id, severity| Violation {
///     analyte_id: "urea".into(),
///     run_index: run,
///     rule_id,
///     severity,
///     description: String::new(),
///     recommended_action: String::new(),
///     statistic: 0.0,
/// };
/// let merged = aggregate([
///     vec![v(2, RuleId::EwmaUpper, Severity::Warning)],
///     vec![v(1, RuleId::CusumUpper, Severity::Critical), v(2, RuleId::Outlier, Severity::Critical)],
/// ]);
/// let ids: Vec<_> = merged.iter().map(|v| (v.run_index, v.rule_id.as_str())).collect();
/// assert_eq!(ids, vec![(1, "CUSUM+"), (2, "MOD-Z"), (2, "EWMA-H")]);
/// ```
///
/// # Complexity
///
/// Time: O(n log n)
pub fn aggregate<I>(batches: I) -> Vec<Violation>
where
    I: IntoIterator<Item = Vec<Violation>>,
{
    let mut all: Vec<Violation> = batches.into_iter().flatten().collect();
    all.sort_by(|a, b| {
        a.run_index
            .cmp(&b.run_index)
            .then_with(|| b.severity.cmp(&a.severity))
            .then_with(|| a.rule_id.as_str().cmp(b.rule_id.as_str()))
            .then_with(|| a.analyte_id.cmp(&b.analyte_id))
    });

    let mut seen: HashSet<(String, u64, RuleId)> = HashSet::with_capacity(all.len());
    all.retain(|v| seen.insert((v.analyte_id.clone(), v.run_index, v.rule_id)));
    all
}

/// Bounded FIFO of recent violations, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationLog {
    entries: VecDeque<Violation>,
    capacity: usize,
}

impl ViolationLog {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, violation: Violation) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(violation);
    }

    pub fn extend<I: IntoIterator<Item = Violation>>(&mut self, violations: I) {
        for v in violations {
            self.push(v);
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Violation> + '_ {
        self.entries.iter()
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&Violation> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn summary(&self) -> QcSummary {
        QcSummary::from_violations(self.entries.iter())
    }
}

/// Overall disposition of a set of violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QcStatus {
    /// No violations.
    InControl,
    /// Warnings only; investigate.
    Warning,
    /// At least one critical violation; reject the run.
    Reject,
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcStatus::InControl => write!(f, "IN CONTROL"),
            QcStatus::Warning => write!(f, "WARNING"),
            QcStatus::Reject => write!(f, "REJECT"),
        }
    }
}

/// Counts and disposition for a set of violations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    /// Violation count per detection method ("Westgard", "CUSUM", ...).
    pub by_method: BTreeMap<&'static str, usize>,
    pub status: QcStatus,
    pub message: String,
}

impl QcSummary {
    /// # Examples
    ///
    /// ```
    /// use u_labqc::monitor::{QcStatus, QcSummary};
    ///
    /// let summary = QcSummary::from_violations(&[]);
    /// assert_eq!(summary.status, QcStatus::InControl);
    /// assert_eq!(summary.total, 0);
    /// ```
    pub fn from_violations<'a, I>(violations: I) -> Self
    where
        I: IntoIterator<Item = &'a Violation>,
    {
        let mut total = 0;
        let mut critical = 0;
        let mut warning = 0;
        let mut by_method = BTreeMap::new();
        for v in violations {
            total += 1;
            match v.severity {
                Severity::Critical => critical += 1,
                Severity::Warning => warning += 1,
            }
            *by_method.entry(v.rule_id.method()).or_insert(0) += 1;
        }

        let (status, message) = if critical > 0 {
            (
                QcStatus::Reject,
                format!("CRITICAL: {critical} critical violations - REJECT run"),
            )
        } else if warning > 0 {
            (
                QcStatus::Warning,
                format!("WARNING: {warning} warnings - Investigate"),
            )
        } else {
            (
                QcStatus::InControl,
                "No violations detected - QC is in control".to_string(),
            )
        };

        Self {
            total,
            critical,
            warning,
            by_method,
            status,
            message,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const RULES: [RuleId; 6] = [
        RuleId::CusumUpper,
        RuleId::CusumLower,
        RuleId::EwmaUpper,
        RuleId::TrendDown,
        RuleId::Outlier,
        RuleId::Westgard(crate::spc::WestgardRule::OneTwoS),
    ];

    fn arb_violation() -> impl Strategy<Value = Violation> {
        (0u64..20, 0usize..RULES.len(), any::<bool>()).prop_map(|(run, r, critical)| Violation {
            analyte_id: "urea".into(),
            run_index: run,
            rule_id: RULES[r],
            severity: if critical {
                Severity::Critical
            } else {
                Severity::Warning
            },
            description: String::new(),
            recommended_action: String::new(),
            statistic: 0.0,
        })
    }

    proptest! {
        #[test]
        fn aggregate_is_sorted_and_unique(
            batches in proptest::collection::vec(proptest::collection::vec(arb_violation(), 0..8), 0..5)
        ) {
            let merged = aggregate(batches);
            for pair in merged.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.run_index <= b.run_index);
                if a.run_index == b.run_index {
                    prop_assert!(a.severity >= b.severity);
                    if a.severity == b.severity {
                        prop_assert!(a.rule_id.as_str() < b.rule_id.as_str());
                    }
                }
            }
            let keys: HashSet<(u64, RuleId)> = merged.iter().map(|v| (v.run_index, v.rule_id)).collect();
            prop_assert_eq!(keys.len(), merged.len());
        }

        #[test]
        fn log_never_exceeds_capacity(
            cap in 1usize..10,
            vs in proptest::collection::vec(arb_violation(), 0..30)
        ) {
            let mut log = ViolationLog::new(cap);
            log.extend(vs);
            prop_assert!(log.len() <= cap);
        }
    }
}
