//! Maintenance engine
//!
//! This module provides:
//! - Training of candidate snapshots and their atomic activation
//! - Scoring passes against the active snapshot
//! - Restoring the latest persisted snapshot at startup

mod scoring;
mod training;

pub use scoring::{score_tools, ScoringOutcome, ScoringReport};
pub use training::{train_snapshot, TrainedSnapshot, TrainingReport};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::Recommendation;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::snapshot::{ModelSnapshot, SnapshotHolder};
use crate::store::MaintenanceStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// A tool left out of a training or scoring pass
#[derive(Debug)]
pub struct ToolFailure {
    pub tool_code: String,
    pub error: EngineError,
}

/// Trains, activates and scores model snapshots over a data store.
///
/// Scoring takes `&self` and may run from many threads at once. Training
/// also takes `&self`, but callers are expected to serialize training runs.
pub struct MaintenanceEngine {
    config: EngineConfig,
    store: Arc<dyn MaintenanceStore>,
    holder: SnapshotHolder,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl MaintenanceEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn MaintenanceStore>) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            holder: SnapshotHolder::new(),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("maintenance-engine"),
        })
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// The active snapshot, if any
    pub fn active_snapshot(&self) -> Option<Arc<ModelSnapshot>> {
        self.holder.current()
    }

    pub fn active_version(&self) -> Option<String> {
        self.holder.current_version()
    }

    /// Activate the latest persisted snapshot.
    ///
    /// A corrupt or incompatible snapshot leaves the engine with no active
    /// model and the error is returned.
    pub fn restore_snapshot(&self) -> EngineResult<Option<String>> {
        match self.store.load_latest_snapshot() {
            Ok(Some(snapshot)) => {
                let version = snapshot.version().to_string();
                self.activate(Arc::new(snapshot));
                Ok(Some(version))
            }
            Ok(None) => {
                info!("No persisted snapshot to restore");
                Ok(None)
            }
            Err(e) => {
                error!(error = %e, "Failed to restore snapshot, no model is active");
                self.holder.clear();
                Err(e)
            }
        }
    }

    /// Activate an already validated snapshot, returning the one it replaced
    pub fn activate(&self, snapshot: Arc<ModelSnapshot>) -> Option<Arc<ModelSnapshot>> {
        let version = snapshot.version().to_string();
        let previous = self.holder.activate(snapshot);
        self.metrics.set_active_snapshot(&version);
        self.logger
            .log_snapshot_activated(previous.as_ref().map(|s| s.version()), &version);
        previous
    }

    /// Train on the store's current records and activate the result.
    ///
    /// On any error the active snapshot is left untouched.
    pub fn train(&self, trained_at: DateTime<Utc>) -> EngineResult<TrainingReport> {
        let start = Instant::now();
        let active = self.active_version();

        let trained = self.fetch_and_train(trained_at).and_then(|trained| {
            self.store
                .persist_snapshot(&trained.snapshot)
                .map_err(|e| {
                    error!(error = %e, "Failed to persist candidate snapshot");
                    EngineError::Store(e)
                })?;
            Ok(trained)
        });
        let TrainedSnapshot { snapshot, skipped } = match trained {
            Ok(trained) => trained,
            Err(e) => {
                self.metrics.inc_training_rejections();
                self.logger
                    .log_training_skipped(&e.to_string(), active.as_deref());
                return Err(e);
            }
        };

        let version = snapshot.version().to_string();
        let metrics = snapshot.metrics().clone();
        let previous = self.activate(Arc::new(snapshot));

        let duration_secs = start.elapsed().as_secs_f64();
        self.metrics.inc_training_runs();
        self.metrics.observe_training_duration(duration_secs);
        self.logger.log_training_completed(
            &version,
            metrics.training_size,
            metrics.holdout_rmse,
            duration_secs,
        );

        Ok(TrainingReport {
            version,
            previous_version: previous.map(|s| s.version().to_string()),
            metrics,
            skipped,
            duration_secs,
        })
    }

    fn fetch_and_train(&self, trained_at: DateTime<Utc>) -> EngineResult<TrainedSnapshot> {
        let tools = self.store.fetch_tools()?;
        let usage = self.store.fetch_usage_history(None)?;
        let maintenance = self.store.fetch_maintenance_history(None)?;
        train_snapshot(&self.config, &tools, &usage, &maintenance, trained_at)
    }

    /// Score the store's current inventory and persist the predictions.
    ///
    /// The whole pass runs against the snapshot active when it starts.
    pub fn score(&self, as_of: DateTime<Utc>) -> EngineResult<ScoringOutcome> {
        let Some(snapshot) = self.holder.current() else {
            warn!("Scoring requested with no active snapshot");
            return Ok(ScoringOutcome::NoModelAvailable);
        };
        let start = Instant::now();

        let tools = self.store.fetch_tools()?;
        let usage = self.store.fetch_usage_history(None)?;
        let maintenance = self.store.fetch_maintenance_history(None)?;

        let report = score_tools(
            &snapshot,
            &self.config,
            &tools,
            &usage,
            &maintenance,
            as_of.date_naive(),
        )?;

        if let Err(e) = self.store.persist_predictions(&report.predictions) {
            error!(error = %e, predictions = report.predictions.len(), "Failed to persist predictions");
            return Err(EngineError::Store(e));
        }

        for failure in &report.failures {
            self.logger
                .log_tool_skipped(&failure.tool_code, &failure.error.to_string());
        }
        for prediction in &report.predictions {
            self.logger.log_prediction(prediction);
        }

        self.metrics.record_predictions(&report.predictions);
        self.metrics.inc_tool_failures(report.failures.len() as u64);
        self.metrics
            .observe_scoring_duration(start.elapsed().as_secs_f64());

        info!(
            version = %report.model_version,
            predictions = report.predictions.len(),
            failures = report.failures.len(),
            alerts = report.alerts().count(),
            "Scoring pass completed"
        );
        Ok(ScoringOutcome::Scored(report))
    }

    /// Maintenance recommendations for a scoring report
    pub fn recommendations(&self, report: &ScoringReport) -> Vec<Recommendation> {
        report.recommendations(self.config.base_maintenance_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ToolRecord, ToolStatus};
    use crate::store::InMemoryStore;
    use chrono::{NaiveDate, TimeZone};

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.min_training_examples = 5;
        config.regressor.n_trees = 8;
        config.anomaly.n_trees = 8;
        config
    }

    fn tools(n: usize) -> Vec<ToolRecord> {
        (0..n)
            .map(|i| ToolRecord {
                tool_code: format!("T-{:02}", i),
                category: "Grinder".to_string(),
                location: "Depot".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                condition_score: 95.0 - i as f64 * 5.0,
                usage_hours: i as f64 * 25.0,
                last_maintenance_date: None,
                status: ToolStatus::Available,
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config();
        bad.confidence_blend_weight = 1.5;
        let store = Arc::new(InMemoryStore::default());
        assert!(matches!(
            MaintenanceEngine::new(bad, store),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_score_without_model() {
        let store = Arc::new(InMemoryStore::new(tools(3), vec![], vec![]));
        let engine = MaintenanceEngine::new(config(), store.clone()).unwrap();
        let outcome = engine.score(now()).unwrap();
        assert!(!outcome.is_available());
        assert!(store.predictions().is_empty());
    }

    #[test]
    fn test_train_then_score() {
        let store = Arc::new(InMemoryStore::new(tools(10), vec![], vec![]));
        let engine = MaintenanceEngine::new(config(), store.clone()).unwrap();

        let report = engine.train(now()).unwrap();
        assert!(report.previous_version.is_none());
        assert_eq!(engine.active_version().as_deref(), Some(report.version.as_str()));
        assert_eq!(store.snapshot_count(), 1);

        let scored = engine.score(now()).unwrap().into_report().unwrap();
        assert_eq!(scored.predictions.len(), 10);
        assert_eq!(store.predictions().len(), 10);
    }

    #[test]
    fn test_failed_snapshot_persist_keeps_active() {
        let store = Arc::new(InMemoryStore::new(tools(10), vec![], vec![]));
        let engine = MaintenanceEngine::new(config(), store.clone()).unwrap();
        engine.train(now()).unwrap();
        let before = engine.active_snapshot().unwrap();

        store.set_fail_writes(true);
        let later = now() + chrono::Duration::days(1);
        assert!(matches!(engine.train(later), Err(EngineError::Store(_))));
        assert!(Arc::ptr_eq(&before, &engine.active_snapshot().unwrap()));
    }

    #[test]
    fn test_failed_prediction_persist_is_fatal() {
        let store = Arc::new(InMemoryStore::new(tools(10), vec![], vec![]));
        let engine = MaintenanceEngine::new(config(), store.clone()).unwrap();
        engine.train(now()).unwrap();

        store.set_fail_writes(true);
        assert!(matches!(engine.score(now()), Err(EngineError::Store(_))));
    }

    #[test]
    fn test_restore_corrupt_snapshot_clears_model() {
        let store = Arc::new(InMemoryStore::new(tools(10), vec![], vec![]));
        let engine = MaintenanceEngine::new(config(), store.clone()).unwrap();
        engine.train(now()).unwrap();
        assert!(engine.active_snapshot().is_some());

        store.put_raw_snapshot(b"{\"format_version\":1}".to_vec());
        assert!(matches!(
            engine.restore_snapshot(),
            Err(EngineError::SnapshotLoad(_))
        ));
        assert!(engine.active_snapshot().is_none());
        assert!(!engine.score(now()).unwrap().is_available());
    }
}
