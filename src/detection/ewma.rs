//! Exponentially Weighted Moving Average (EWMA) chart for detecting small shifts.
//!
//! # Algorithm
//!
//! The EWMA statistic is defined as:
//!
//! ```text
//! Z_i = lambda * x_i + (1 - lambda) * Z_{i-1},   Z_0 = mu_0
//! ```
//!
//! Steady-state (asymptotic) control limits:
//!
//! ```text
//! UCL = mu_0 + L * sigma * sqrt(lambda / (2 - lambda))
//! LCL = mu_0 - L * sigma * sqrt(lambda / (2 - lambda))
//! ```
//!
//! A point whose Z_i lies outside the limits signals. The first point of an
//! excursion is a warning; every further consecutive out-of-limit point on
//! the same side is critical. Coming back inside the limits, or jumping to
//! the opposite limit, ends the excursion.
//!
//! # Parameters
//!
//! - **lambda**: smoothing constant in (0, 1]. Smaller values give more weight
//!   to historical data and are better at detecting small shifts.
//!   Typical range: 0.05-0.25.
//! - **L**: control limit width factor in multiples of sigma. Typical: 2.7-3.0.
//!
//! # Reference
//!
//! Roberts, S.W. (1959). "Control Chart Tests Based on Geometric Moving Averages",
//! *Technometrics* 1(3), pp. 239-250.

use tracing::debug;

use crate::spc::{Measurement, RuleId, Severity, Violation};

/// EWMA state for one analyte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwmaState {
    /// Previous smoothed value Z_{i-1}.
    pub z_prev: f64,
    /// Consecutive out-of-limit points ending at the latest observation.
    pub consecutive_out: u32,
}

impl EwmaState {
    /// Fresh state starting at the target mean.
    pub fn new(target: f64) -> Self {
        Self {
            z_prev: target,
            consecutive_out: 0,
        }
    }

    pub fn reset(&mut self, target: f64) {
        *self = Self::new(target);
    }
}

/// EWMA chart parameters.
///
/// # Examples
///
/// ```
/// use u_labqc::detection::Ewma;
///
/// let ewma = Ewma::with_params(1.0, 0.05, 0.2, 2.7).unwrap();
/// let (lcl, ucl) = ewma.control_limits();
/// assert!((ucl - 1.0450).abs() < 1e-3);
/// assert!((lcl - 0.9550).abs() < 1e-3);
/// ```
///
/// # Reference
///
/// Roberts, S.W. (1959). "Control Chart Tests Based on Geometric Moving Averages",
/// *Technometrics* 1(3).
#[derive(Debug, Clone, PartialEq)]
pub struct Ewma {
    /// Target process mean (mu_0).
    target: f64,
    /// Known process standard deviation (sigma).
    sigma: f64,
    /// Smoothing constant (0 < lambda <= 1).
    lambda: f64,
    /// Control limit width factor (L), default 2.7.
    l_factor: f64,
}

/// Result of feeding one observation into the EWMA.
#[derive(Debug, Clone, PartialEq)]
pub struct EwmaResult {
    /// EWMA statistic Z_i.
    pub ewma: f64,
    /// Upper control limit.
    pub ucl: f64,
    /// Lower control limit.
    pub lcl: f64,
    /// Whether the EWMA statistic lies outside the control limits.
    pub signal: bool,
    /// Length of the current excursion, including this point (0 when inside).
    pub consecutive_out: u32,
}

impl EwmaResult {
    /// Severity of the signal, if any: warning on the first out-of-limit
    /// point, critical from the second consecutive one onwards.
    pub fn severity(&self) -> Option<Severity> {
        match self.consecutive_out {
            0 => None,
            1 => Some(Severity::Warning),
            _ => Some(Severity::Critical),
        }
    }
}

impl Ewma {
    /// Creates a new EWMA chart with the given target mean and standard deviation.
    ///
    /// Uses default parameters lambda=0.2 and L=2.7.
    ///
    /// # Returns
    ///
    /// `None` if `sigma` is not positive or finite, or if `target` is not finite.
    pub fn new(target: f64, sigma: f64) -> Option<Self> {
        Self::with_params(target, sigma, 0.2, 2.7)
    }

    /// Creates an EWMA chart with custom parameters.
    ///
    /// # Parameters
    ///
    /// - `target`: Process target mean (mu_0, must be finite)
    /// - `sigma`: Process standard deviation (must be positive and finite)
    /// - `lambda`: Smoothing constant (must be in (0, 1])
    /// - `l_factor`: Control limit width factor (must be positive and finite)
    ///
    /// # Returns
    ///
    /// `None` if any parameter is invalid.
    pub fn with_params(target: f64, sigma: f64, lambda: f64, l_factor: f64) -> Option<Self> {
        if !target.is_finite() {
            return None;
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return None;
        }
        if !lambda.is_finite() || lambda <= 0.0 || lambda > 1.0 {
            return None;
        }
        if !l_factor.is_finite() || l_factor <= 0.0 {
            return None;
        }
        Some(Self {
            target,
            sigma,
            lambda,
            l_factor,
        })
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Fresh state for this chart.
    pub fn initial_state(&self) -> EwmaState {
        EwmaState::new(self.target)
    }

    /// Steady-state control limit half-width `L * sigma * sqrt(lambda / (2 - lambda))`.
    fn control_limit_half_width(&self) -> f64 {
        self.l_factor * self.sigma * (self.lambda / (2.0 - self.lambda)).sqrt()
    }

    /// Returns `(LCL, UCL)`.
    pub fn control_limits(&self) -> (f64, f64) {
        let half_width = self.control_limit_half_width();
        (self.target - half_width, self.target + half_width)
    }

    /// Feeds one observation, mutating `state` in place.
    ///
    /// A non-finite observation carries the previous smoothed value forward
    /// and never signals.
    ///
    /// # Complexity
    ///
    /// Time: O(1)
    pub fn update(&self, state: &mut EwmaState, x: f64) -> EwmaResult {
        let (lcl, ucl) = self.control_limits();
        if !x.is_finite() {
            return EwmaResult {
                ewma: state.z_prev,
                ucl,
                lcl,
                signal: false,
                consecutive_out: state.consecutive_out,
            };
        }

        let z = self.lambda * x + (1.0 - self.lambda) * state.z_prev;
        let signal = z > ucl || z < lcl;
        // an out-of-limit z_prev sits on the side of the running excursion
        let same_side = (z > self.target) == (state.z_prev > self.target);

        state.z_prev = z;
        state.consecutive_out = match (signal, same_side) {
            (false, _) => 0,
            (true, true) => state.consecutive_out.saturating_add(1),
            (true, false) => 1,
        };

        EwmaResult {
            ewma: z,
            ucl,
            lcl,
            signal,
            consecutive_out: state.consecutive_out,
        }
    }

    /// Feeds one measurement and returns the resulting violation, if any.
    pub fn evaluate(&self, state: &mut EwmaState, measurement: &Measurement) -> Vec<Violation> {
        let step = self.update(state, measurement.value);
        debug!(
            analyte = %measurement.analyte_id,
            run_index = measurement.run_index,
            ewma = step.ewma,
            "ewma updated"
        );

        let severity = match step.severity() {
            Some(severity) => severity,
            None => return Vec::new(),
        };

        let (rule_id, description, action) = if step.ewma > step.ucl {
            (
                RuleId::EwmaUpper,
                format!("EWMA exceeds upper limit ({:.4} > {:.4})", step.ewma, step.ucl),
                "Upward drift detected",
            )
        } else {
            (
                RuleId::EwmaLower,
                format!("EWMA below lower limit ({:.4} < {:.4})", step.ewma, step.lcl),
                "Downward drift detected",
            )
        };
        let prefix = match severity {
            Severity::Warning => "WARNING",
            Severity::Critical => "REJECT",
        };

        vec![Violation {
            analyte_id: measurement.analyte_id.clone(),
            run_index: measurement.run_index,
            rule_id,
            severity,
            description,
            recommended_action: format!("{prefix} - {action}"),
            statistic: step.ewma,
        }]
    }

    /// Replays a sequence through a fresh state and returns every step.
    ///
    /// # Complexity
    ///
    /// Time: O(n), Space: O(n)
    pub fn analyze(&self, data: &[f64]) -> Vec<EwmaResult> {
        let mut state = self.initial_state();
        data.iter().map(|&x| self.update(&mut state, x)).collect()
    }

    /// Returns the indices of observations where an EWMA signal occurred.
    ///
    /// # Complexity
    ///
    /// Time: O(n), Space: O(k) where k is the number of signal points
    pub fn signal_points(&self, data: &[f64]) -> Vec<usize> {
        self.analyze(data)
            .into_iter()
            .enumerate()
            .filter(|(_, r)| r.signal)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab_chart() -> Ewma {
        Ewma::with_params(1.0, 0.05, 0.2, 2.7).expect("valid params")
    }

    #[test]
    fn test_ewma_in_control_stays_at_target() {
        let ewma = Ewma::new(25.0, 2.0).expect("valid params");
        for r in ewma.analyze(&[25.0; 50]) {
            assert!((r.ewma - 25.0).abs() < 1e-10);
            assert!(!r.signal);
        }
    }

    #[test]
    fn test_ewma_steady_state_limits() {
        let (lcl, ucl) = lab_chart().control_limits();
        let half = 2.7 * 0.05 * (0.2_f64 / 1.8).sqrt();
        assert!((ucl - (1.0 + half)).abs() < 1e-12);
        assert!((lcl - (1.0 - half)).abs() < 1e-12);
        assert!((ucl - 1.0451).abs() < 1e-3);
    }

    #[test]
    fn test_ewma_recursion() {
        let ewma = lab_chart();
        let mut state = ewma.initial_state();
        let r = ewma.update(&mut state, 1.1);
        assert!((r.ewma - 1.02).abs() < 1e-12);
        let r = ewma.update(&mut state, 1.1);
        assert!((r.ewma - 1.036).abs() < 1e-12);
        assert!((state.z_prev - 1.036).abs() < 1e-12);
    }

    #[test]
    fn test_ewma_short_step_fires_once() {
        // Three points at 1.1 push Z to 1.0488 > UCL; back at baseline it
        // falls to 1.0390 and keeps decaying.
        let mut data = vec![1.1; 3];
        data.extend(vec![1.0; 10]);
        let results = lab_chart().analyze(&data);
        let signals: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.signal)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(signals, vec![2]);
        assert_eq!(results[2].severity(), Some(Severity::Warning));
    }

    #[test]
    fn test_ewma_sustained_step_escalates() {
        let results = lab_chart().analyze(&[1.1; 6]);
        assert_eq!(results[1].severity(), None);
        assert_eq!(results[2].severity(), Some(Severity::Warning));
        assert_eq!(results[3].severity(), Some(Severity::Critical));
        assert_eq!(results[5].severity(), Some(Severity::Critical));
        assert_eq!(results[5].consecutive_out, 4);
    }

    #[test]
    fn test_ewma_downward_violation() {
        let ewma = lab_chart();
        let mut state = ewma.initial_state();
        let last = (0..3)
            .map(|run| ewma.evaluate(&mut state, &Measurement::new("creatinine", run, 0.9)))
            .last()
            .expect("three evaluations");
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].rule_id, RuleId::EwmaLower);
        assert_eq!(last[0].severity, Severity::Warning);
        assert_eq!(last[0].run_index, 2);
        assert!(last[0].recommended_action.starts_with("WARNING"));
    }

    #[test]
    fn test_ewma_side_change_starts_new_excursion() {
        // lambda = 1 makes Z the raw value, limits +-3
        let ewma = Ewma::with_params(0.0, 1.0, 1.0, 3.0).expect("valid params");
        let mut state = ewma.initial_state();
        let up = ewma.evaluate(&mut state, &Measurement::new("x", 1, 4.0));
        assert_eq!(up[0].rule_id, RuleId::EwmaUpper);
        assert_eq!(up[0].severity, Severity::Warning);

        let down = ewma.evaluate(&mut state, &Measurement::new("x", 2, -4.0));
        assert_eq!(down[0].rule_id, RuleId::EwmaLower);
        assert_eq!(down[0].severity, Severity::Warning);
        assert_eq!(state.consecutive_out, 1);

        let down = ewma.evaluate(&mut state, &Measurement::new("x", 3, -4.0));
        assert_eq!(down[0].severity, Severity::Critical);
    }

    #[test]
    fn test_ewma_reset() {
        let ewma = lab_chart();
        let mut state = ewma.initial_state();
        for _ in 0..5 {
            ewma.update(&mut state, 1.2);
        }
        assert!(state.consecutive_out > 0);
        state.reset(ewma.target());
        assert_eq!(state, EwmaState::new(1.0));
    }

    #[test]
    fn test_ewma_lambda_one_tracks_raw_values() {
        let ewma = Ewma::with_params(0.0, 1.0, 1.0, 3.0).expect("valid params");
        let results = ewma.analyze(&[0.5, -2.0, 4.0]);
        assert!((results[0].ewma - 0.5).abs() < 1e-12);
        assert!((results[1].ewma + 2.0).abs() < 1e-12);
        assert!(results[2].signal, "lambda = 1 makes limits +-3 sigma");
    }

    #[test]
    fn test_ewma_invalid_params() {
        assert!(Ewma::new(0.0, 0.0).is_none());
        assert!(Ewma::new(f64::NAN, 1.0).is_none());
        assert!(Ewma::with_params(0.0, 1.0, 0.0, 3.0).is_none());
        assert!(Ewma::with_params(0.0, 1.0, 1.1, 3.0).is_none());
        assert!(Ewma::with_params(0.0, 1.0, 0.2, 0.0).is_none());
    }

    #[test]
    fn test_ewma_non_finite_carries_state() {
        let ewma = lab_chart();
        let mut state = ewma.initial_state();
        ewma.update(&mut state, 1.05);
        let before = state;
        let r = ewma.update(&mut state, f64::INFINITY);
        assert!(!r.signal);
        assert_eq!(state, before);
    }
}
