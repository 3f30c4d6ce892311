//! Observability infrastructure for the maintenance engine
//!
//! Provides:
//! - Prometheus metrics (training and scoring latency, run counters, active snapshot)
//! - Structured JSON logging of domain events with tracing

use crate::models::{Prediction, Priority};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntGaugeVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for training and scoring passes (in seconds)
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance, `None` if registration failed
static GLOBAL_METRICS: OnceLock<Option<EngineMetricsInner>> = OnceLock::new();

struct EngineMetricsInner {
    training_duration_seconds: Histogram,
    scoring_duration_seconds: Histogram,
    training_runs: IntCounter,
    training_rejections: IntCounter,
    predictions_generated: IntCounter,
    tool_failures: IntCounter,
    active_snapshot_info: GaugeVec,
    predictions_by_priority: IntGaugeVec,
}

impl EngineMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            training_duration_seconds: register_histogram!(
                "maintenance_engine_training_duration_seconds",
                "Time spent training a candidate snapshot",
                DURATION_BUCKETS.to_vec()
            )?,
            scoring_duration_seconds: register_histogram!(
                "maintenance_engine_scoring_duration_seconds",
                "Time spent scoring the tool inventory",
                DURATION_BUCKETS.to_vec()
            )?,
            training_runs: register_int_counter!(
                "maintenance_engine_training_runs_total",
                "Total number of training runs that activated a snapshot"
            )?,
            training_rejections: register_int_counter!(
                "maintenance_engine_training_rejections_total",
                "Total number of training runs rejected before activation"
            )?,
            predictions_generated: register_int_counter!(
                "maintenance_engine_predictions_generated_total",
                "Total number of predictions generated"
            )?,
            tool_failures: register_int_counter!(
                "maintenance_engine_tool_failures_total",
                "Total number of tools skipped during scoring"
            )?,
            active_snapshot_info: register_gauge_vec!(
                "maintenance_engine_active_snapshot_info",
                "Information about the active model snapshot",
                &["version"]
            )?,
            predictions_by_priority: register_int_gauge_vec!(
                "maintenance_engine_predictions_by_priority",
                "Predictions in the latest scoring pass by priority tier",
                &["priority"]
            )?,
        })
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match EngineMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register engine metrics, metrics disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&EngineMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.training_duration_seconds.observe(duration_secs);
        }
    }

    pub fn observe_scoring_duration(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.scoring_duration_seconds.observe(duration_secs);
        }
    }

    pub fn inc_training_runs(&self) {
        if let Some(m) = self.inner() {
            m.training_runs.inc();
        }
    }

    pub fn inc_training_rejections(&self) {
        if let Some(m) = self.inner() {
            m.training_rejections.inc();
        }
    }

    pub fn inc_tool_failures(&self, count: u64) {
        if let Some(m) = self.inner() {
            m.tool_failures.inc_by(count);
        }
    }

    /// Update the active snapshot version
    pub fn set_active_snapshot(&self, version: &str) {
        if let Some(m) = self.inner() {
            m.active_snapshot_info.reset();
            m.active_snapshot_info.with_label_values(&[version]).set(1.0);
        }
    }

    /// Record the predictions of one scoring pass
    pub fn record_predictions(&self, predictions: &[Prediction]) {
        let Some(m) = self.inner() else {
            return;
        };
        m.predictions_generated.inc_by(predictions.len() as u64);
        for priority in Priority::ALL {
            let count = predictions.iter().filter(|p| p.priority == priority).count();
            m.predictions_by_priority
                .with_label_values(&[priority.as_str()])
                .set(count as i64);
        }
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render() -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for predictions,
/// training runs and snapshot changes.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log a prediction generation event
    pub fn log_prediction(&self, prediction: &Prediction) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            tool_code = %prediction.tool_code,
            confidence = prediction.confidence,
            priority = %prediction.priority,
            predicted_failure_date = %prediction.predicted_failure_date,
            predicted_condition = prediction.predicted_condition,
            anomaly_score = prediction.anomaly_score,
            model_version = %prediction.model_version,
            "Generated failure prediction"
        );
    }

    /// Log a tool left out of a scoring pass
    pub fn log_tool_skipped(&self, tool_code: &str, reason: &str) {
        warn!(
            event = "tool_skipped",
            instance = %self.instance,
            tool_code = %tool_code,
            reason = %reason,
            "Tool skipped during scoring"
        );
    }

    pub fn log_training_completed(
        &self,
        version: &str,
        training_size: usize,
        holdout_rmse: Option<f64>,
        duration_secs: f64,
    ) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            version = %version,
            training_size = training_size,
            holdout_rmse = ?holdout_rmse,
            duration_secs = duration_secs,
            "Trained model snapshot"
        );
    }

    /// Log a training run that left the active snapshot in place
    pub fn log_training_skipped(&self, reason: &str, active_version: Option<&str>) {
        warn!(
            event = "training_skipped",
            instance = %self.instance,
            reason = %reason,
            active_version = active_version.unwrap_or("none"),
            "Training skipped, keeping active snapshot"
        );
    }

    pub fn log_snapshot_activated(&self, old_version: Option<&str>, new_version: &str) {
        info!(
            event = "snapshot_activated",
            instance = %self.instance,
            old_version = old_version.unwrap_or("none"),
            new_version = %new_version,
            "Model snapshot activated"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, mode: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            mode = %mode,
            "Maintenance agent started"
        );
    }

    pub fn log_finished(&self, predictions: usize, alerts: usize, model_version: Option<&str>) {
        info!(
            event = "agent_finished",
            instance = %self.instance,
            predictions = predictions,
            alerts = alerts,
            model_version = model_version.unwrap_or("none"),
            "Maintenance agent finished"
        );
    }
}
