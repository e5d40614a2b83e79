//! Sigma level and defect rate conversions.
//!
//! Long-term defect rates assume the process mean drifts 1.5σ from where it
//! was characterised:
//!
//! | Sigma | Defects per million |
//! |-------|---------------------|
//! | 6.0   | 3.4                 |
//! | 5.0   | 233                 |
//! | 4.0   | 6,210               |
//! | 3.0   | 66,807              |
//! | 2.0   | 308,538             |
//!
//! # References
//!
//! - Harry & Schroeder (2000), *Six Sigma: The Breakthrough Management Strategy*.
//! - Westgard, J.O. (2006). *Six Sigma Quality Design and Control*, 2nd ed.

use u_numflow::special::{inverse_normal_cdf, standard_normal_cdf};

/// Long-term mean shift, in σ units, assumed by the conversions.
pub const LONG_TERM_SHIFT: f64 = 1.5;

/// Converts a sigma metric to a long-term defects-per-million rate.
///
/// ```text
/// DPM = 1,000,000 * (1 - Phi(sigma - 1.5))
/// ```
///
/// # Examples
///
/// ```
/// use u_labqc::capability::sigma_to_dpm;
///
/// assert!((sigma_to_dpm(6.0) - 3.4).abs() < 1.0);
/// assert!((sigma_to_dpm(3.0) - 66_807.0).abs() < 500.0);
/// ```
pub fn sigma_to_dpm(sigma: f64) -> f64 {
    1_000_000.0 * (1.0 - standard_normal_cdf(sigma - LONG_TERM_SHIFT))
}

/// Converts a defects-per-million rate back to a sigma metric.
///
/// # Returns
///
/// `None` if `dpm` is NaN or outside `(0, 1_000_000)`.
///
/// # Examples
///
/// ```
/// use u_labqc::capability::dpm_to_sigma;
///
/// let sigma = dpm_to_sigma(233.0).unwrap();
/// assert!((sigma - 5.0).abs() < 0.1);
/// assert!(dpm_to_sigma(0.0).is_none());
/// ```
pub fn dpm_to_sigma(dpm: f64) -> Option<f64> {
    if dpm.is_nan() || dpm <= 0.0 || dpm >= 1_000_000.0 {
        return None;
    }
    let z = inverse_normal_cdf(1.0 - dpm / 1_000_000.0);
    z.is_finite().then_some(z + LONG_TERM_SHIFT)
}
