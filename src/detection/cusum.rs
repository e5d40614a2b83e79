//! Cumulative Sum (CUSUM) chart for detecting small persistent shifts in process mean.
//!
//! # Algorithm
//!
//! Given observations x_1, x_2, ... with target mean mu_0 and standard
//! deviation sigma, with reference value K = k·sigma and decision interval
//! H = h·sigma (both in measurement units):
//!
//! ```text
//! C+(i) = max(0, C+(i-1) + (x_i - mu_0 - K))
//! C-(i) = max(0, C-(i-1) + (mu_0 - K - x_i))
//! ```
//!
//! A signal is generated when `C+(i) > H` (upward shift) or `C-(i) > H`
//! (downward shift). The accumulator that signalled restarts at zero so a
//! sustained shift does not re-signal on every subsequent point; the other
//! accumulator is left as it was.
//!
//! # Parameters
//!
//! - **k**: reference value (allowance) in sigma units, typically 0.5
//!   (designed to detect a 1-sigma shift)
//! - **h**: decision interval in sigma units, typically 4 or 5
//!
//! # Reference
//!
//! Page, E.S. (1954). "Continuous inspection schemes", *Biometrika* 41(1-2), pp. 100-115.

use tracing::debug;

use crate::spc::{Measurement, RuleId, Severity, Violation};

/// CUSUM accumulators for one analyte, in measurement units.
///
/// Carried across calls for the lifetime of a monitoring session and reset
/// only on explicit operator action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CusumState {
    /// Upper cumulative sum C+.
    pub c_plus: f64,
    /// Lower cumulative sum C-.
    pub c_minus: f64,
}

impl CusumState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// CUSUM chart parameters.
///
/// Implements the tabular (two-sided) CUSUM procedure for detecting
/// both upward and downward shifts in a process mean.
///
/// # Examples
///
/// ```
/// use u_labqc::detection::{Cusum, CusumState};
///
/// // mu = 1.0, sigma = 0.05, k = 0.5 sigma, h = 4 sigma
/// let cusum = Cusum::with_params(1.0, 0.05, 0.5, 4.0).unwrap();
/// let mut state = CusumState::default();
///
/// let first = cusum.update(&mut state, 1.1);
/// assert!((first.c_plus - 0.075).abs() < 1e-9);
/// assert!(!first.upper_signal);
///
/// cusum.update(&mut state, 1.1);
/// let third = cusum.update(&mut state, 1.1);
/// assert!(third.upper_signal);
/// assert_eq!(state.c_plus, 0.0); // restarted after signalling
/// ```
///
/// # Reference
///
/// Page, E.S. (1954). "Continuous inspection schemes", *Biometrika* 41(1-2).
#[derive(Debug, Clone, PartialEq)]
pub struct Cusum {
    /// Target process mean (mu_0).
    target: f64,
    /// Known process standard deviation (sigma).
    sigma: f64,
    /// Reference value in sigma units, default 0.5.
    k: f64,
    /// Decision interval in sigma units, default 4.0.
    h: f64,
}

/// Result of feeding one observation into the CUSUM.
#[derive(Debug, Clone, PartialEq)]
pub struct CusumResult {
    /// Upper cumulative sum after this observation, before any restart.
    pub c_plus: f64,
    /// Lower cumulative sum after this observation, before any restart.
    pub c_minus: f64,
    /// C+ exceeded the decision interval.
    pub upper_signal: bool,
    /// C- exceeded the decision interval.
    pub lower_signal: bool,
}

impl CusumResult {
    pub fn signal(&self) -> bool {
        self.upper_signal || self.lower_signal
    }
}

impl Cusum {
    /// Creates a new CUSUM chart with the given target mean and standard deviation.
    ///
    /// Uses default parameters k=0.5 and h=4.0.
    ///
    /// # Returns
    ///
    /// `None` if `sigma` is not positive or finite, or if `target` is not finite.
    pub fn new(target: f64, sigma: f64) -> Option<Self> {
        Self::with_params(target, sigma, 0.5, 4.0)
    }

    /// Creates a CUSUM chart with custom k and h parameters.
    ///
    /// # Parameters
    ///
    /// - `target`: Process target mean (mu_0)
    /// - `sigma`: Process standard deviation (must be positive and finite)
    /// - `k`: Reference value in sigma units (must be non-negative and finite)
    /// - `h`: Decision interval in sigma units (must be positive and finite)
    ///
    /// # Returns
    ///
    /// `None` if any parameter is invalid.
    pub fn with_params(target: f64, sigma: f64, k: f64, h: f64) -> Option<Self> {
        if !target.is_finite() {
            return None;
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return None;
        }
        if !k.is_finite() || k < 0.0 {
            return None;
        }
        if !h.is_finite() || h <= 0.0 {
            return None;
        }
        Some(Self {
            target,
            sigma,
            k,
            h,
        })
    }

    /// Reference value K in measurement units.
    pub fn slack(&self) -> f64 {
        self.k * self.sigma
    }

    /// Decision interval H in measurement units.
    pub fn decision_interval(&self) -> f64 {
        self.h * self.sigma
    }

    /// Feeds one observation, mutating `state` in place.
    ///
    /// A non-finite observation leaves the state unchanged and never signals.
    ///
    /// # Complexity
    ///
    /// Time: O(1)
    pub fn update(&self, state: &mut CusumState, x: f64) -> CusumResult {
        if !x.is_finite() {
            return CusumResult {
                c_plus: state.c_plus,
                c_minus: state.c_minus,
                upper_signal: false,
                lower_signal: false,
            };
        }

        let slack = self.slack();
        let limit = self.decision_interval();
        let c_plus = (state.c_plus + (x - self.target - slack)).max(0.0);
        let c_minus = (state.c_minus + (self.target - slack - x)).max(0.0);

        let upper_signal = c_plus > limit;
        let lower_signal = c_minus > limit;

        state.c_plus = if upper_signal { 0.0 } else { c_plus };
        state.c_minus = if lower_signal { 0.0 } else { c_minus };

        CusumResult {
            c_plus,
            c_minus,
            upper_signal,
            lower_signal,
        }
    }

    /// Feeds one measurement and returns the resulting violations.
    pub fn evaluate(&self, state: &mut CusumState, measurement: &Measurement) -> Vec<Violation> {
        let step = self.update(state, measurement.value);
        debug!(
            analyte = %measurement.analyte_id,
            run_index = measurement.run_index,
            c_plus = step.c_plus,
            c_minus = step.c_minus,
            "cusum updated"
        );

        let mut violations = Vec::new();
        if step.upper_signal {
            violations.push(Violation {
                analyte_id: measurement.analyte_id.clone(),
                run_index: measurement.run_index,
                rule_id: RuleId::CusumUpper,
                severity: Severity::Critical,
                description: format!(
                    "Upward shift detected (CUSUM+ = {:.4} > h = {:.4})",
                    step.c_plus,
                    self.decision_interval()
                ),
                recommended_action: "REJECT - Sustained upward shift".to_string(),
                statistic: step.c_plus,
            });
        }
        if step.lower_signal {
            violations.push(Violation {
                analyte_id: measurement.analyte_id.clone(),
                run_index: measurement.run_index,
                rule_id: RuleId::CusumLower,
                severity: Severity::Critical,
                description: format!(
                    "Downward shift detected (CUSUM- = {:.4} > h = {:.4})",
                    step.c_minus,
                    self.decision_interval()
                ),
                recommended_action: "REJECT - Sustained downward shift".to_string(),
                statistic: step.c_minus,
            });
        }
        violations
    }

    /// Replays a sequence through a fresh state and returns every step.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_labqc::detection::Cusum;
    ///
    /// let cusum = Cusum::new(10.0, 1.0).unwrap();
    /// // Data with upward shift
    /// let mut data: Vec<f64> = vec![10.0; 10];
    /// data.extend(vec![12.0; 10]); // shift of 2 sigma
    /// let signals = cusum.signal_points(&data);
    /// assert!(!signals.is_empty()); // shift detected
    /// ```
    ///
    /// # Complexity
    ///
    /// Time: O(n), Space: O(n)
    pub fn analyze(&self, data: &[f64]) -> Vec<CusumResult> {
        let mut state = CusumState::default();
        data.iter().map(|&x| self.update(&mut state, x)).collect()
    }

    /// Returns the indices of observations where a CUSUM signal occurred.
    ///
    /// # Complexity
    ///
    /// Time: O(n), Space: O(k) where k is the number of signal points
    pub fn signal_points(&self, data: &[f64]) -> Vec<usize> {
        self.analyze(data)
            .into_iter()
            .enumerate()
            .filter(|(_, r)| r.signal())
            .map(|(i, _)| i)
            .collect()
    }
}
