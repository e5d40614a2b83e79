//! Per-analyte monitoring state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregate::{aggregate, QcSummary, ViolationLog};
use crate::capability::{classify_sigma, BatchStatistics, SigmaMetric};
use crate::config::AnalyteConfig;
use crate::detection::{Cusum, CusumState, Ewma, EwmaState, OutlierDetector, TrendDetector};
use crate::error::{QcError, Result};
use crate::spc::{
    CheckOutcome, InconclusiveCheck, Measurement, MeasurementWindow, RunRule, Severity, Violation,
    WestgardRules,
};

/// Everything one push produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Violations for the pushed run, ordered and de-duplicated.
    pub violations: Vec<Violation>,
    /// Checks skipped because a statistic collapsed to zero.
    pub inconclusive: Vec<InconclusiveCheck>,
    /// Measurement that fell out of the window, if it was full.
    pub evicted: Option<Measurement>,
}

impl EvaluationReport {
    /// No violations were raised.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    pub fn has_critical(&self) -> bool {
        self.max_severity() == Some(Severity::Critical)
    }
}

/// Window, detector state and violation log for one analyte.
///
/// All mutation goes through `&mut self`, so a monitor has exactly one
/// writer at a time. Monitors share only their read-only configuration and
/// can be driven from different threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_labqc::config::{AnalyteConfig, AnalyteProfile};
/// use u_labqc::monitor::AnalyteMonitor;
/// use u_labqc::spc::Measurement;
///
/// let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).unwrap();
/// let mut monitor = AnalyteMonitor::new(Arc::new(AnalyteConfig::new(profile))).unwrap();
///
/// let report = monitor.evaluate(Measurement::new("creatinine", 1, 1.175)).unwrap();
/// let ids: Vec<&str> = report.violations.iter().map(|v| v.rule_id.as_str()).collect();
/// assert_eq!(ids, vec!["1-3s", "1-2s"]);
/// assert!(report.has_critical());
/// ```
#[derive(Debug, Clone)]
pub struct AnalyteMonitor {
    config: Arc<AnalyteConfig>,
    window: MeasurementWindow,
    rules: WestgardRules,
    cusum: Cusum,
    cusum_state: CusumState,
    ewma: Ewma,
    ewma_state: EwmaState,
    trend: TrendDetector,
    outlier: OutlierDetector,
    log: ViolationLog,
}

impl AnalyteMonitor {
    /// Builds a monitor after validating `config`.
    ///
    /// # Errors
    ///
    /// [`QcError::InvalidConfig`] for any out-of-domain parameter.
    pub fn new(config: Arc<AnalyteConfig>) -> Result<Self> {
        config.validate()?;
        let profile = &config.profile;
        let (mean, sd) = (profile.target_mean, profile.target_std);

        let cusum = Cusum::with_params(mean, sd, config.cusum_k, config.cusum_h)
            .ok_or_else(|| QcError::config("cusum", "rejected by CUSUM chart"))?;
        let ewma = Ewma::with_params(mean, sd, config.ewma_lambda, config.ewma_l)
            .ok_or_else(|| QcError::config("ewma", "rejected by EWMA chart"))?;
        let trend = TrendDetector::new(sd, config.trend_window)
            .ok_or_else(|| QcError::config("trend_window", "rejected by trend detector"))?;
        let outlier = OutlierDetector::new(config.anomaly_threshold, config.trend_window)
            .ok_or_else(|| QcError::config("anomaly_threshold", "rejected by outlier detector"))?;

        Ok(Self {
            window: MeasurementWindow::new(profile.analyte_id.clone(), config.window_capacity)?,
            rules: WestgardRules::new(config.rules.clone()),
            cusum_state: CusumState::default(),
            ewma_state: ewma.initial_state(),
            log: ViolationLog::new(config.log_capacity),
            cusum,
            ewma,
            trend,
            outlier,
            config,
        })
    }

    pub fn analyte_id(&self) -> &str {
        self.config.analyte_id()
    }

    pub fn config(&self) -> &AnalyteConfig {
        &self.config
    }

    /// Admits one measurement and runs every detector on it.
    ///
    /// A rejected measurement leaves the window, detector state and log
    /// exactly as they were.
    ///
    /// # Errors
    ///
    /// [`QcError::AnalyteMismatch`], [`QcError::NonFiniteValue`] or
    /// [`QcError::OutOfOrder`], as for [`MeasurementWindow::push`].
    pub fn evaluate(&mut self, measurement: Measurement) -> Result<EvaluationReport> {
        let evicted = match self.window.push(measurement.clone()) {
            Ok(evicted) => evicted,
            Err(err) => {
                warn!(
                    analyte = %self.analyte_id(),
                    run_index = measurement.run_index,
                    error = %err,
                    "measurement rejected"
                );
                return Err(err);
            }
        };

        let westgard = self.rules.check(&self.window, &self.config.profile);
        let cusum = self.cusum.evaluate(&mut self.cusum_state, &measurement);
        let ewma = self.ewma.evaluate(&mut self.ewma_state, &measurement);

        let mut windowed = Vec::new();
        let mut inconclusive = Vec::new();
        for outcome in [self.trend.check(&self.window), self.outlier.check(&self.window)] {
            match outcome {
                CheckOutcome::Violation(v) => windowed.push(v),
                CheckOutcome::Inconclusive(check) => inconclusive.push(check),
                CheckOutcome::NotEvaluated | CheckOutcome::Clear => {}
            }
        }

        let violations = aggregate([westgard, cusum, ewma, windowed]);
        self.log.extend(violations.iter().cloned());

        debug!(
            analyte = %measurement.analyte_id,
            run_index = measurement.run_index,
            value = measurement.value,
            violations = violations.len(),
            inconclusive = inconclusive.len(),
            "measurement evaluated"
        );
        for v in violations.iter().filter(|v| v.severity == Severity::Critical) {
            info!(
                analyte = %v.analyte_id,
                run_index = v.run_index,
                rule = %v.rule_id,
                statistic = v.statistic,
                "critical QC violation"
            );
        }

        Ok(EvaluationReport {
            violations,
            inconclusive,
            evicted,
        })
    }

    /// Restarts CUSUM and EWMA at their initial state.
    ///
    /// The window, its run ordering and the violation log are kept.
    pub fn reset(&mut self) {
        self.cusum_state.reset();
        self.ewma_state.reset(self.ewma.target());
        info!(analyte = %self.analyte_id(), "detector state reset");
    }

    pub fn cusum_state(&self) -> CusumState {
        self.cusum_state
    }

    pub fn ewma_state(&self) -> EwmaState {
        self.ewma_state
    }

    pub fn window(&self) -> &MeasurementWindow {
        &self.window
    }

    pub fn log(&self) -> &ViolationLog {
        &self.log
    }

    /// Summary of the violations currently in the log.
    pub fn summary(&self) -> QcSummary {
        self.log.summary()
    }

    /// Sigma metric for externally accumulated Bias% and CV% against this
    /// analyte's TEa.
    ///
    /// # Errors
    ///
    /// As [`classify_sigma`].
    pub fn classify(&self, bias_pct: f64, cv_pct: f64) -> Result<SigmaMetric> {
        classify_sigma(self.config.profile.tea_pct, bias_pct, cv_pct)
    }

    /// Bias and CV of the measurements currently in the window.
    ///
    /// # Errors
    ///
    /// As [`BatchStatistics::from_values`].
    pub fn batch_statistics(&self) -> Result<BatchStatistics> {
        BatchStatistics::from_values(&self.window.values(), self.config.profile.target_mean)
    }

    /// Sigma metric of the current window.
    ///
    /// # Errors
    ///
    /// As [`BatchStatistics::from_values`] and [`classify_sigma`].
    pub fn classify_window(&self) -> Result<SigmaMetric> {
        self.batch_statistics()?.classify(self.config.profile.tea_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::QualityTier;
    use crate::config::AnalyteProfile;
    use crate::spc::{CheckKind, RuleId, WestgardRule};

    fn monitor() -> AnalyteMonitor {
        let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).expect("valid profile");
        AnalyteMonitor::new(Arc::new(AnalyteConfig::new(profile))).expect("valid config")
    }

    fn push(monitor: &mut AnalyteMonitor, run: u64, value: f64) -> EvaluationReport {
        monitor
            .evaluate(Measurement::new("creatinine", run, value))
            .expect("accepted")
    }

    fn ids(report: &EvaluationReport) -> Vec<&'static str> {
        report.violations.iter().map(|v| v.rule_id.as_str()).collect()
    }

    #[test]
    fn test_monitor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnalyteMonitor>();
    }

    #[test]
    fn test_single_gross_error() {
        let mut m = monitor();
        let report = push(&mut m, 1, 1.175);
        assert_eq!(ids(&report), vec!["1-3s", "1-2s"]);
        assert_eq!(report.violations[0].severity, Severity::Critical);
        assert!(report.inconclusive.is_empty());
        assert!(report.evicted.is_none());
        // c+ = 0.175 - 0.025 = 0.15, below h = 0.2
        assert!((m.cusum_state().c_plus - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_values_on_two_sd_limit_do_not_fire() {
        // 1.10 is z = 2.0000000000000018 after division
        let mut m = monitor();
        assert!(push(&mut m, 1, 1.10).is_clean());
        assert!(push(&mut m, 2, 1.10).is_clean());

        let mut m = monitor();
        assert!(push(&mut m, 1, 0.90).is_clean());
        assert!(push(&mut m, 2, 0.90).is_clean());
    }

    #[test]
    fn test_range_on_four_sd_limit_does_not_fire() {
        let mut m = monitor();
        assert!(push(&mut m, 1, 0.95).is_clean());
        // z = -1 then 3: 1-2s only, neither R-4s nor 1-3s
        let report = push(&mut m, 2, 1.15);
        assert_eq!(ids(&report), vec!["1-2s"]);
    }

    #[test]
    fn test_ten_x_fires_on_tenth_run_only() {
        let mut m = monitor();
        for run in 1..=9 {
            let report = push(&mut m, run, 1.02);
            assert!(
                !ids(&report).contains(&"10-x"),
                "10-x fired early at run {run}"
            );
        }
        let report = push(&mut m, 10, 1.02);
        let fired = ids(&report);
        assert!(fired.contains(&"10-x"));
        assert!(fired.contains(&"9-x"));
        assert!(fired.contains(&"6-x"));
        assert!(!fired.contains(&"12-x"));
        // Ten identical values: MAD is zero.
        assert_eq!(report.inconclusive.len(), 1);
        assert_eq!(report.inconclusive[0].check, CheckKind::RobustOutlier);
    }

    #[test]
    fn test_duplicate_run_rejected_without_side_effects() {
        let mut m = monitor();
        push(&mut m, 1, 1.1);
        let cusum_before = m.cusum_state();
        let ewma_before = m.ewma_state();

        let err = m
            .evaluate(Measurement::new("creatinine", 1, 1.1))
            .expect_err("duplicate run");
        assert!(matches!(err, QcError::OutOfOrder { last: 1, got: 1, .. }));
        assert_eq!(m.window().len(), 1);
        assert_eq!(m.cusum_state(), cusum_before);
        assert_eq!(m.ewma_state(), ewma_before);
    }

    #[test]
    fn test_rejects_other_analyte_and_nan() {
        let mut m = monitor();
        assert!(matches!(
            m.evaluate(Measurement::new("urea", 1, 25.0)),
            Err(QcError::AnalyteMismatch { .. })
        ));
        assert!(matches!(
            m.evaluate(Measurement::new("creatinine", 1, f64::NAN)),
            Err(QcError::NonFiniteValue { .. })
        ));
        assert!(m.window().is_empty());
    }

    #[test]
    fn test_cusum_shift_fires_and_restarts() {
        let mut m = monitor();
        // +0.1 shift: c+ grows by 0.075 per run and crosses 0.2 on the third.
        push(&mut m, 1, 1.1);
        push(&mut m, 2, 1.1);
        let report = push(&mut m, 3, 1.1);
        assert!(ids(&report).contains(&"CUSUM+"));
        assert_eq!(m.cusum_state().c_plus, 0.0);
    }

    #[test]
    fn test_reset_restores_initial_detector_state() {
        let mut m = monitor();
        push(&mut m, 1, 1.1);
        push(&mut m, 2, 1.1);
        m.reset();
        assert_eq!(m.cusum_state(), CusumState::default());
        assert!((m.ewma_state().z_prev - 1.0).abs() < 1e-12);
        assert_eq!(m.ewma_state().consecutive_out, 0);
        assert_eq!(m.window().len(), 2);
        // Ordering guard survives the reset.
        assert!(m
            .evaluate(Measurement::new("creatinine", 2, 1.0))
            .is_err());
    }

    #[test]
    fn test_log_and_summary_accumulate() {
        let mut m = monitor();
        push(&mut m, 1, 1.175);
        push(&mut m, 2, 1.0);
        assert_eq!(m.log().len(), 2);
        let summary = m.summary();
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.by_method.get("Westgard"), Some(&2));
    }

    #[test]
    fn test_disabled_rules_are_not_evaluated() {
        let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).expect("valid profile");
        let mut config = AnalyteConfig::new(profile);
        config.rules = vec![WestgardRule::OneThreeS];
        let mut m = AnalyteMonitor::new(Arc::new(config)).expect("valid config");
        let report = push(&mut m, 1, 1.175);
        assert_eq!(ids(&report), vec!["1-3s"]);
        assert_eq!(
            report.violations[0].rule_id,
            RuleId::Westgard(WestgardRule::OneThreeS)
        );
    }

    #[test]
    fn test_window_eviction_reported() {
        let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).expect("valid profile");
        let mut config = AnalyteConfig::new(profile);
        config.window_capacity = 12;
        let mut m = AnalyteMonitor::new(Arc::new(config)).expect("valid config");
        for run in 0..12 {
            assert!(push(&mut m, run, 1.0).evicted.is_none());
        }
        let report = push(&mut m, 12, 1.0);
        assert_eq!(report.evicted.map(|e| e.run_index), Some(0));
        assert_eq!(m.window().len(), 12);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let profile = AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).expect("valid profile");
        let mut config = AnalyteConfig::new(profile);
        config.ewma_lambda = 1.5;
        assert!(matches!(
            AnalyteMonitor::new(Arc::new(config)),
            Err(QcError::InvalidConfig { field: "ewma_lambda", .. })
        ));
    }

    #[test]
    fn test_classify() {
        let m = monitor();
        let metric = m.classify(1.0, 5.0).expect("valid input");
        assert!((metric.sigma - 2.8).abs() < 0.01);
        assert_eq!(metric.tier, QualityTier::Poor);
        assert!(matches!(
            m.classify(1.0, 0.0),
            Err(QcError::DegenerateStatistics { .. })
        ));
    }

    #[test]
    fn test_classify_window() {
        let mut m = monitor();
        assert!(matches!(
            m.classify_window(),
            Err(QcError::InvalidInput { .. })
        ));
        for (run, v) in [1.00, 1.04, 1.02, 0.98, 1.06].into_iter().enumerate() {
            push(&mut m, run as u64, v);
        }
        let batch = m.batch_statistics().expect("enough values");
        assert!((batch.bias_pct - 2.0).abs() < 1e-9);
        let metric = m.classify_window().expect("non-degenerate");
        assert_eq!(metric.tier, QualityTier::Good);
    }
}
