//! One agent invocation: restore, optionally retrain, score

use crate::config::AgentMode;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use maintenance_engine::{EngineError, MaintenanceEngine, Recommendation, ScoringOutcome};
use tracing::{info, warn};

/// What a run produced
#[derive(Debug, Default)]
pub struct RunSummary {
    pub trained_version: Option<String>,
    pub model_version: Option<String>,
    pub predictions: usize,
    pub alerts: usize,
    pub failures: usize,
    pub recommendations: Vec<Recommendation>,
    /// Scoring was requested but no snapshot was active
    pub model_unavailable: bool,
}

pub fn run(engine: &MaintenanceEngine, mode: AgentMode, now: DateTime<Utc>) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    match engine.restore_snapshot() {
        Ok(version) => {
            info!(version = version.as_deref().unwrap_or("none"), "Snapshot restored");
        }
        // a fresh training run replaces the unreadable snapshot
        Err(e @ EngineError::SnapshotLoad(_)) if mode.trains() => {
            warn!(error = %e, "Persisted snapshot unusable, retraining from scratch");
        }
        Err(e) => return Err(e).context("Failed to restore model snapshot"),
    }

    if mode.trains() {
        match engine.train(now) {
            Ok(report) => {
                info!(
                    version = %report.version,
                    previous = report.previous_version.as_deref().unwrap_or("none"),
                    skipped = report.skipped.len(),
                    "Training run activated a new snapshot"
                );
                summary.trained_version = Some(report.version);
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Training skipped, previous snapshot stays active");
            }
            Err(e) => return Err(e).context("Training failed"),
        }
    }

    if mode.scores() {
        match engine.score(now).context("Scoring failed")? {
            ScoringOutcome::Scored(report) => {
                for alert in report.alerts() {
                    info!(
                        tool_code = %alert.tool_code,
                        priority = %alert.priority,
                        confidence = alert.confidence,
                        predicted_failure_date = %alert.predicted_failure_date,
                        "Maintenance alert"
                    );
                }
                summary.model_version = Some(report.model_version.clone());
                summary.predictions = report.predictions.len();
                summary.alerts = report.alerts().count();
                summary.failures = report.failures.len();
                summary.recommendations = engine.recommendations(&report);
            }
            ScoringOutcome::NoModelAvailable => {
                warn!("No model available, alerts suppressed");
                summary.model_unavailable = true;
            }
        }
    }

    summary.model_version = summary.model_version.or_else(|| engine.active_version());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use maintenance_engine::{EngineConfig, InMemoryStore, ToolRecord, ToolStatus};
    use std::sync::Arc;

    fn store(n: usize) -> Arc<InMemoryStore> {
        let tools = (0..n)
            .map(|i| ToolRecord {
                tool_code: format!("PW-{:03}", i),
                category: "Power Tools".to_string(),
                location: "Warehouse A".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2025, 1, 15),
                condition_score: 98.0 - i as f64 * 6.0,
                usage_hours: i as f64 * 30.0,
                last_maintenance_date: None,
                status: ToolStatus::Available,
            })
            .collect();
        Arc::new(InMemoryStore::new(tools, vec![], vec![]))
    }

    fn engine(store: Arc<InMemoryStore>) -> MaintenanceEngine {
        let mut config = EngineConfig::default();
        config.regressor.n_trees = 8;
        config.anomaly.n_trees = 8;
        MaintenanceEngine::new(config, store).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_train_and_score() {
        let store = store(15);
        let engine = engine(store.clone());
        let summary = run(&engine, AgentMode::TrainAndScore, now()).unwrap();

        assert!(summary.trained_version.is_some());
        assert_eq!(summary.model_version, summary.trained_version);
        assert_eq!(summary.predictions, 15);
        assert_eq!(store.predictions().len(), 15);
        assert!(!summary.model_unavailable);
    }

    #[test]
    fn test_score_without_snapshot() {
        let store = store(15);
        let engine = engine(store.clone());
        let summary = run(&engine, AgentMode::Score, now()).unwrap();

        assert!(summary.model_unavailable);
        assert_eq!(summary.predictions, 0);
        assert!(store.predictions().is_empty());
    }

    #[test]
    fn test_small_inventory_skips_training() {
        let store = store(3);
        let engine = engine(store.clone());
        let summary = run(&engine, AgentMode::TrainAndScore, now()).unwrap();

        assert!(summary.trained_version.is_none());
        assert!(summary.model_unavailable);
    }

    #[test]
    fn test_corrupt_snapshot_fails_score_mode() {
        let store = store(15);
        store.put_raw_snapshot(b"not a snapshot".to_vec());
        let engine = engine(store.clone());
        assert!(run(&engine, AgentMode::Score, now()).is_err());

        let summary = run(&engine, AgentMode::TrainAndScore, now()).unwrap();
        assert!(summary.trained_version.is_some());
    }
}
