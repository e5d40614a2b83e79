//! Registry of analyte monitors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::analyte::{AnalyteMonitor, EvaluationReport};
use crate::capability::SigmaMetric;
use crate::config::AnalyteConfig;
use crate::error::{QcError, Result};
use crate::spc::Measurement;

/// Routes measurements to their analyte's monitor.
///
/// Analytes are independent: an error for one never touches another, and
/// [`QcEngine::monitors_mut`] hands out disjoint mutable handles so separate
/// analytes can be evaluated on separate threads.
///
/// # Examples
///
/// ```
/// use u_labqc::config::{AnalyteConfig, AnalyteProfile};
/// use u_labqc::monitor::QcEngine;
/// use u_labqc::spc::Measurement;
///
/// let mut engine = QcEngine::new();
/// engine.register(AnalyteConfig::new(AnalyteProfile::new("urea", 25.0, 1.5, 9.0).unwrap())).unwrap();
///
/// let report = engine.evaluate("urea", Measurement::new("urea", 1, 25.3)).unwrap();
/// assert!(report.is_clean());
/// assert!(engine.evaluate("glucose", Measurement::new("glucose", 1, 5.0)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QcEngine {
    monitors: BTreeMap<String, AnalyteMonitor>,
}

impl QcEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an analyte.
    ///
    /// # Errors
    ///
    /// - [`QcError::InvalidConfig`] if the configuration does not validate.
    /// - [`QcError::DuplicateAnalyte`] if the analyte is already registered.
    pub fn register(&mut self, config: impl Into<Arc<AnalyteConfig>>) -> Result<()> {
        let config = config.into();
        let id = config.analyte_id().to_string();
        if self.monitors.contains_key(&id) {
            return Err(QcError::DuplicateAnalyte(id));
        }
        let monitor = AnalyteMonitor::new(config)?;
        info!(analyte = %id, "analyte registered");
        self.monitors.insert(id, monitor);
        Ok(())
    }

    /// Evaluates one measurement for `analyte_id`.
    ///
    /// # Errors
    ///
    /// - [`QcError::UnknownAnalyte`] if `analyte_id` is not registered.
    /// - [`QcError::AnalyteMismatch`] if the measurement names another analyte.
    /// - Any rejection from [`AnalyteMonitor::evaluate`].
    pub fn evaluate(&mut self, analyte_id: &str, measurement: Measurement) -> Result<EvaluationReport> {
        if measurement.analyte_id != analyte_id {
            return Err(QcError::AnalyteMismatch {
                expected: analyte_id.to_string(),
                got: measurement.analyte_id,
            });
        }
        self.monitor_mut(analyte_id)?.evaluate(measurement)
    }

    /// Sigma metric for `analyte_id` from accumulated Bias% and CV%.
    ///
    /// # Errors
    ///
    /// [`QcError::UnknownAnalyte`], or as [`crate::capability::classify_sigma`].
    pub fn classify(&self, analyte_id: &str, bias_pct: f64, cv_pct: f64) -> Result<SigmaMetric> {
        self.monitor(analyte_id)?.classify(bias_pct, cv_pct)
    }

    /// Restarts the CUSUM and EWMA state of one analyte.
    ///
    /// # Errors
    ///
    /// [`QcError::UnknownAnalyte`].
    pub fn reset(&mut self, analyte_id: &str) -> Result<()> {
        self.monitor_mut(analyte_id)?.reset();
        Ok(())
    }

    pub fn monitor(&self, analyte_id: &str) -> Result<&AnalyteMonitor> {
        self.monitors
            .get(analyte_id)
            .ok_or_else(|| QcError::UnknownAnalyte(analyte_id.to_string()))
    }

    pub fn monitor_mut(&mut self, analyte_id: &str) -> Result<&mut AnalyteMonitor> {
        self.monitors
            .get_mut(analyte_id)
            .ok_or_else(|| QcError::UnknownAnalyte(analyte_id.to_string()))
    }

    /// Every monitor, in analyte id order.
    pub fn monitors(&self) -> impl Iterator<Item = &AnalyteMonitor> + '_ {
        self.monitors.values()
    }

    /// Disjoint mutable handles to every monitor, in analyte id order.
    pub fn monitors_mut(&mut self) -> impl Iterator<Item = &mut AnalyteMonitor> + '_ {
        self.monitors.values_mut()
    }

    /// Registered analyte ids, sorted.
    pub fn analytes(&self) -> impl Iterator<Item = &str> + '_ {
        self.monitors.keys().map(String::as_str)
    }

    /// Unregisters an analyte, returning its monitor.
    ///
    /// # Errors
    ///
    /// [`QcError::UnknownAnalyte`].
    pub fn remove(&mut self, analyte_id: &str) -> Result<AnalyteMonitor> {
        let monitor = self
            .monitors
            .remove(analyte_id)
            .ok_or_else(|| QcError::UnknownAnalyte(analyte_id.to_string()))?;
        info!(analyte = %analyte_id, "analyte removed");
        Ok(monitor)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyteProfile;

    fn engine() -> QcEngine {
        let mut engine = QcEngine::new();
        engine
            .register(AnalyteConfig::new(
                AnalyteProfile::new("creatinine", 1.0, 0.05, 15.0).expect("valid profile"),
            ))
            .expect("registered");
        engine
            .register(AnalyteConfig::new(
                AnalyteProfile::new("urea", 25.0, 1.5, 9.0).expect("valid profile"),
            ))
            .expect("registered");
        engine
    }

    #[test]
    fn test_register_and_list() {
        let e = engine();
        assert_eq!(e.len(), 2);
        assert_eq!(e.analytes().collect::<Vec<_>>(), vec!["creatinine", "urea"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut e = engine();
        let err = e
            .register(AnalyteConfig::new(
                AnalyteProfile::new("urea", 30.0, 2.0, 9.0).expect("valid profile"),
            ))
            .expect_err("duplicate");
        assert_eq!(err, QcError::DuplicateAnalyte("urea".into()));
        // First registration wins.
        let target = e.monitor("urea").expect("registered").config().profile.target_mean;
        assert!((target - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_register_rejects_invalid_config() {
        let mut e = QcEngine::new();
        let mut config = AnalyteConfig::new(
            AnalyteProfile::new("glucose", 5.5, 0.2, 6.9).expect("valid profile"),
        );
        config.window_capacity = 5;
        assert!(matches!(
            e.register(config),
            Err(QcError::InvalidConfig { field: "trend_window", .. })
        ));
        assert!(e.is_empty());
    }

    #[test]
    fn test_unknown_analyte() {
        let mut e = engine();
        assert_eq!(
            e.evaluate("glucose", Measurement::new("glucose", 1, 5.0))
                .expect_err("unknown"),
            QcError::UnknownAnalyte("glucose".into())
        );
        assert!(matches!(e.reset("glucose"), Err(QcError::UnknownAnalyte(_))));
        assert!(matches!(
            e.classify("glucose", 1.0, 2.0),
            Err(QcError::UnknownAnalyte(_))
        ));
        assert!(e.remove("glucose").is_err());
    }

    #[test]
    fn test_measurement_routed_to_wrong_analyte() {
        let mut e = engine();
        let err = e
            .evaluate("urea", Measurement::new("creatinine", 1, 1.0))
            .expect_err("mismatch");
        assert!(matches!(err, QcError::AnalyteMismatch { .. }));
        assert!(e.monitor("urea").expect("registered").window().is_empty());
        assert!(e.monitor("creatinine").expect("registered").window().is_empty());
    }

    #[test]
    fn test_error_in_one_analyte_leaves_others_alone() {
        let mut e = engine();
        e.evaluate("creatinine", Measurement::new("creatinine", 5, 1.0))
            .expect("accepted");
        assert!(e
            .evaluate("creatinine", Measurement::new("creatinine", 4, 1.0))
            .is_err());
        e.evaluate("urea", Measurement::new("urea", 1, 25.0))
            .expect("independent run sequence");
        assert_eq!(e.monitor("urea").expect("registered").window().len(), 1);
    }

    #[test]
    fn test_classify_uses_analyte_tea() {
        let e = engine();
        // urea TEa 9%: (9 - 1) / 2 = 4
        let metric = e.classify("urea", 1.0, 2.0).expect("valid input");
        assert!((metric.sigma - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_and_remove() {
        let mut e = engine();
        e.evaluate("creatinine", Measurement::new("creatinine", 1, 1.1))
            .expect("accepted");
        e.reset("creatinine").expect("registered");
        assert_eq!(
            e.monitor("creatinine").expect("registered").cusum_state().c_plus,
            0.0
        );
        let removed = e.remove("creatinine").expect("registered");
        assert_eq!(removed.window().len(), 1);
        assert_eq!(e.len(), 1);
    }
}
