//! Ordinary least squares for the drift test.
//!
//! Fits y = intercept + slope · x and tests H₀: slope = 0 with a two-sided
//! t-test on n − 2 degrees of freedom.
//!
//! # Examples
//!
//! ```
//! use u_labqc::regression::simple_linear_regression;
//!
//! let x = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let y = [2.1, 3.9, 6.1, 7.9, 10.1];
//! let result = simple_linear_regression(&x, &y).unwrap();
//! assert!((result.slope - 2.0).abs() < 0.1);
//! assert!(result.r_squared > 0.99);
//! assert!(result.slope_p < 0.01);
//! ```

use u_numflow::special;
use u_numflow::stats;

/// Result of a simple linear regression: y = intercept + slope · x.
#[derive(Debug, Clone)]
pub struct SimpleRegressionResult {
    /// Slope coefficient (β₁).
    pub slope: f64,
    /// Intercept (β₀).
    pub intercept: f64,
    /// Coefficient of determination (R²).
    pub r_squared: f64,
    /// Standard error of the slope.
    pub slope_se: f64,
    /// t-statistic for slope (H₀: β₁ = 0).
    pub slope_t: f64,
    /// Two-sided p-value for slope.
    pub slope_p: f64,
    /// Residual standard error (√(SSE/(n-2))).
    pub residual_se: f64,
    /// Sample size.
    pub n: usize,
}

impl SimpleRegressionResult {
    /// Fitted value at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Computes simple linear regression (OLS closed-form).
///
/// # Algorithm
///
/// β₁ = cov(x,y) / var(x)
/// β₀ = ȳ - β₁·x̄
///
/// An exact fit (zero residuals) has zero slope standard error; the slope is
/// then reported significant (p = 0) unless it is itself zero (p = 1).
///
/// # Returns
///
/// `None` if fewer than 3 observations, slices differ in length, x has zero
/// variance, or inputs contain non-finite values.
///
/// # References
///
/// Draper & Smith (1998). "Applied Regression Analysis", 3rd edition.
pub fn simple_linear_regression(x: &[f64], y: &[f64]) -> Option<SimpleRegressionResult> {
    let n = x.len();
    if n < 3 || n != y.len() {
        return None;
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let x_mean = stats::mean(x)?;
    let y_mean = stats::mean(y)?;
    let x_var = stats::variance(x)?;
    let cov = stats::covariance(x, y)?;

    if x_var < 1e-300 {
        return None; // zero variance in x
    }

    let slope = cov / x_var;
    let intercept = y_mean - slope * x_mean;

    let ss_res: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| (yi - (intercept + slope * xi)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum();

    let df_res = n as f64 - 2.0;

    let r_squared = if ss_tot > 1e-300 {
        1.0 - ss_res / ss_tot
    } else {
        1.0
    };

    let mse = ss_res / df_res;
    let residual_se = mse.sqrt();

    let ss_x: f64 = x.iter().map(|&xi| (xi - x_mean).powi(2)).sum();
    let slope_se = (mse / ss_x).sqrt();

    let (slope_t, slope_p) = if slope_se > 1e-300 {
        let t = slope / slope_se;
        (t, 2.0 * (1.0 - special::t_distribution_cdf(t.abs(), df_res)))
    } else if slope.abs() > 1e-300 {
        (f64::INFINITY.copysign(slope), 0.0)
    } else {
        (0.0, 1.0)
    };

    Some(SimpleRegressionResult {
        slope,
        intercept,
        r_squared,
        slope_se,
        slope_t,
        slope_p: slope_p.clamp(0.0, 1.0),
        residual_se,
        n,
    })
}
