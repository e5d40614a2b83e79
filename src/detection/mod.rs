//! Shift, drift, and outlier detection.
//!
//! Sequential detectors complementing the Westgard rules. CUSUM and EWMA
//! carry state from run to run; the trend and outlier checks are recomputed
//! over the measurement window on every push.
//!
//! # Detectors
//!
//! - [`Cusum`] — Cumulative Sum chart (Page, 1954) for small persistent shifts
//! - [`Ewma`] — Exponentially Weighted Moving Average chart (Roberts, 1959)
//! - [`TrendDetector`] — OLS slope significance over the most recent runs
//! - [`OutlierDetector`] — modified z-score (Iglewicz & Hoaglin, 1993)
//!
//! # References
//!
//! - Page, E.S. (1954). "Continuous Inspection Schemes",
//!   *Biometrika* 41(1/2), pp. 100-115.
//! - Roberts, S.W. (1959). "Control Chart Tests Based on Geometric Moving Averages",
//!   *Technometrics* 1(3), pp. 239-250.

mod cusum;
mod ewma;
mod outlier;
mod trend;

pub use cusum::{Cusum, CusumResult, CusumState};
pub use ewma::{Ewma, EwmaResult, EwmaState};
pub use outlier::{modified_z_scores, OutlierDetector};
pub use trend::{TrendDetector, TrendFit};
