//! Levey-Jennings charting with Westgard multi-rules.
//!
//! # Building blocks
//!
//! - [`Measurement`] — one control result for one analyte
//! - [`MeasurementWindow`] — bounded ring buffer of recent measurements
//! - [`WestgardRule`] / [`WestgardRules`] — the rule table and a configurable subset
//! - [`Violation`] — a classified finding emitted by any detector
//!
//! # References
//!
//! - Westgard, J.O. et al. (1981). "A Multi-Rule Shewhart Chart for Quality
//!   Control in Clinical Chemistry", *Clinical Chemistry* 27(3), pp. 493-501.
//! - Levey, S. & Jennings, E.R. (1950). "The use of control charts in the
//!   clinical laboratory", *Am. J. Clin. Pathol.* 20(11), pp. 1059-1066.

mod chart;
mod rules;
mod window;

pub use chart::{
    CheckKind, CheckOutcome, InconclusiveCheck, Measurement, RuleId, Severity, Violation,
};
pub use rules::{RunRule, WestgardRule, WestgardRules, TIE_TOLERANCE};
pub use window::MeasurementWindow;
