//! Error type shared by every fallible operation in the crate.
//!
//! Insufficient history is deliberately absent: rules that need more points
//! than the window holds are skipped without error.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, QcError>;

/// Errors raised while configuring or feeding the QC engine.
///
/// Every variant is recoverable; none leaves an analyte's state partially
/// updated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QcError {
    /// A measurement's run index did not advance past the last accepted one.
    #[error("out-of-order measurement for {analyte_id}: run {got} is not after run {last}")]
    OutOfOrder {
        analyte_id: String,
        last: u64,
        got: u64,
    },

    /// A measurement value was NaN or infinite.
    #[error("non-finite value for {analyte_id} at run {run_index}")]
    NonFiniteValue { analyte_id: String, run_index: u64 },

    /// A measurement was routed to the state of a different analyte.
    #[error("measurement for {got} routed to analyte {expected}")]
    AnalyteMismatch { expected: String, got: String },

    /// A statistic needed by a check collapsed to zero (CV, MAD, SD).
    #[error("degenerate statistics in {check}: {reason}")]
    DegenerateStatistics {
        check: &'static str,
        reason: String,
    },

    /// Configuration rejected before any measurement was accepted.
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// An argument to an on-demand computation was out of its domain.
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String,
    },

    #[error("unknown analyte: {0}")]
    UnknownAnalyte(String),

    #[error("analyte already registered: {0}")]
    DuplicateAnalyte(String),
}

impl QcError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(check: &'static str, reason: impl Into<String>) -> Self {
        Self::DegenerateStatistics {
            check,
            reason: reason.into(),
        }
    }
}
