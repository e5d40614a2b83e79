//! Analytical method quality on the Six Sigma scale.
//!
//! # Contents
//!
//! - [`classify_sigma`] — sigma metric and [`QualityTier`] from TEa%, Bias% and CV%
//! - [`BatchStatistics`] — Bias% and CV% of a batch of control results
//! - [`sigma_to_dpm`] / [`dpm_to_sigma`] — long-term defect rate conversions
//!
//! # References
//!
//! - Westgard, J.O. (2006), *Six Sigma Quality Design and Control*, 2nd ed.
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.

mod batch;
mod sigma_level;
mod sigma_metric;

pub use batch::BatchStatistics;
pub use sigma_level::{dpm_to_sigma, sigma_to_dpm, LONG_TERM_SHIFT};
pub use sigma_metric::{classify_sigma, QualityTier, SigmaMetric};
