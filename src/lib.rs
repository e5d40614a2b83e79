//! # u-labqc
//!
//! Statistical quality control for clinical laboratory analytes: Westgard
//! multi-rules, CUSUM and EWMA shift detection, drift and outlier tests,
//! and Six Sigma method classification.
//!
//! Measurements are fed one at a time per analyte; every push runs the full
//! detector battery and returns an ordered, de-duplicated list of
//! violations. Sigma classification is computed on demand.
//!
//! ## Modules
//!
//! - [`spc`] — measurements, the bounded window, and Westgard rules
//! - [`detection`] — CUSUM, EWMA, linear drift and modified z-score outliers
//! - [`capability`] — sigma metric, quality tier, batch Bias/CV
//! - [`monitor`] — per-analyte monitors, the multi-analyte engine, aggregation
//! - [`regression`] — simple OLS used by the drift test
//! - [`config`] — serde-loadable per-analyte configuration
//! - [`error`] — the crate error type
//!
//! ## Example
//!
//! ```
//! use u_labqc::config::{AnalyteConfig, AnalyteProfile};
//! use u_labqc::monitor::QcEngine;
//! use u_labqc::spc::{Measurement, Severity};
//!
//! let mut engine = QcEngine::new();
//! let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0)?;
//! engine.register(AnalyteConfig::new(profile))?;
//!
//! let report = engine.evaluate("creatinine", Measurement::new("creatinine", 1, 1.175))?;
//! assert_eq!(report.max_severity(), Some(Severity::Critical));
//! # Ok::<(), u_labqc::QcError>(())
//! ```
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod capability;
pub mod config;
pub mod detection;
pub mod error;
pub mod monitor;
pub mod regression;
pub mod spc;

pub use error::{QcError, Result};
