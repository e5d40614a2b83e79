//! Stream evaluation: per-analyte monitors, the engine, and aggregation.
//!
//! An [`AnalyteMonitor`] owns one analyte's window and CUSUM/EWMA state and
//! runs the full detector battery on every measurement. [`QcEngine`] keys
//! monitors by analyte id. [`aggregate`] merges detector output into one
//! ordered report; [`ViolationLog`] and [`QcSummary`] keep the recent
//! history and its disposition.

mod aggregate;
mod analyte;
mod engine;

pub use aggregate::{aggregate, QcStatus, QcSummary, ViolationLog};
pub use analyte::{AnalyteMonitor, EvaluationReport};
pub use engine::QcEngine;
