//! Scoring against one snapshot

use super::ToolFailure;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureBuilder;
use crate::models::{MaintenanceRecord, Prediction, Recommendation, ToolRecord, UsageRecord};
use crate::predictor::{recommend, RiskConfig, RiskScorer};
use crate::snapshot::ModelSnapshot;
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::debug;

/// Predictions of one scoring pass plus the tools it could not score
#[derive(Debug)]
pub struct ScoringReport {
    pub model_version: String,
    pub prediction_date: NaiveDate,
    /// Sorted by confidence, highest first
    pub predictions: Vec<Prediction>,
    pub failures: Vec<ToolFailure>,
}

impl ScoringReport {
    /// Predictions the alerting component should act on
    pub fn alerts(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter().filter(|p| p.requires_alert())
    }

    pub fn recommendations(&self, base_cost: f64) -> Vec<Recommendation> {
        recommend(&self.predictions, base_cost)
    }
}

/// Result of a scoring request
#[derive(Debug)]
pub enum ScoringOutcome {
    Scored(ScoringReport),
    /// No snapshot is active; alerts must be suppressed
    NoModelAvailable,
}

impl ScoringOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, ScoringOutcome::Scored(_))
    }

    pub fn report(&self) -> Option<&ScoringReport> {
        match self {
            ScoringOutcome::Scored(report) => Some(report),
            ScoringOutcome::NoModelAvailable => None,
        }
    }

    /// The report, or `NoModelAvailable` as an error
    pub fn into_report(self) -> EngineResult<ScoringReport> {
        match self {
            ScoringOutcome::Scored(report) => Ok(report),
            ScoringOutcome::NoModelAvailable => Err(EngineError::NoModelAvailable),
        }
    }
}

/// Score every tool against `snapshot`.
///
/// Tools whose features cannot be built are reported as failures; the rest
/// of the batch is scored.
pub fn score_tools(
    snapshot: &ModelSnapshot,
    config: &EngineConfig,
    tools: &[ToolRecord],
    usage_history: &[UsageRecord],
    maintenance_history: &[MaintenanceRecord],
    as_of: NaiveDate,
) -> EngineResult<ScoringReport> {
    let mut report = ScoringReport {
        model_version: snapshot.version().to_string(),
        prediction_date: as_of,
        predictions: Vec::new(),
        failures: Vec::new(),
    };
    if tools.is_empty() {
        return Ok(report);
    }

    let builder = FeatureBuilder::new(snapshot.schema().clone(), as_of);
    let set = builder.build(tools, usage_history, maintenance_history)?;

    let scorer = RiskScorer::new(RiskConfig::from(config))
        .with_importances(snapshot.feature_importances())
        .with_model_version(snapshot.version());

    report.predictions = set
        .vectors
        .values()
        .map(|vector| {
            let condition = snapshot.regressor().predict(vector);
            let anomaly = snapshot.detector().score(vector);
            debug!(
                tool_code = %vector.tool_code,
                predicted_condition = condition,
                anomaly_score = anomaly,
                "Tool scored"
            );
            scorer.score(condition, anomaly, vector, as_of)
        })
        .collect();
    report.predictions.sort_by(by_confidence_desc);

    report.failures = set
        .rejected
        .into_iter()
        .map(|(tool_code, error)| ToolFailure { tool_code, error })
        .collect();
    Ok(report)
}

fn by_confidence_desc(a: &Prediction, b: &Prediction) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.tool_code.cmp(&b.tool_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::train_snapshot;
    use crate::models::ToolStatus;
    use chrono::{TimeZone, Utc};

    fn tool(code: &str, category: &str, usage_hours: f64, condition: f64) -> ToolRecord {
        ToolRecord {
            tool_code: code.to_string(),
            category: category.to_string(),
            location: "Depot".to_string(),
            purchase_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            condition_score: condition,
            usage_hours,
            last_maintenance_date: None,
            status: ToolStatus::InUse,
        }
    }

    fn snapshot() -> ModelSnapshot {
        let mut config = EngineConfig::default();
        config.regressor.n_trees = 10;
        config.anomaly.n_trees = 10;
        let tools: Vec<ToolRecord> = (0..12)
            .map(|i| tool(&format!("T-{:02}", i), "Drill", i as f64 * 20.0, 100.0 - i as f64 * 8.0))
            .collect();
        let trained_at = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        train_snapshot(&config, &tools, &[], &[], trained_at)
            .unwrap()
            .snapshot
    }

    #[test]
    fn test_empty_inventory_scores_nothing() {
        let snapshot = snapshot();
        let as_of = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let report = score_tools(&snapshot, &EngineConfig::default(), &[], &[], &[], as_of).unwrap();
        assert!(report.predictions.is_empty());
        assert_eq!(report.model_version, snapshot.version());
    }

    #[test]
    fn test_predictions_sorted_and_versioned() {
        let snapshot = snapshot();
        let as_of = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let tools = vec![
            tool("A", "Drill", 0.0, 100.0),
            tool("B", "Drill", 220.0, 10.0),
            tool("C", "Welder", 120.0, 50.0),
        ];
        let report =
            score_tools(&snapshot, &EngineConfig::default(), &tools, &[], &[], as_of).unwrap();

        assert_eq!(report.predictions.len(), 3);
        assert!(report.failures.is_empty());
        for pair in report.predictions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for prediction in &report.predictions {
            assert_eq!(prediction.model_version, snapshot.version());
            assert_eq!(prediction.prediction_date, as_of);
            assert!((0.0..=1.0).contains(&prediction.confidence));
        }
    }

    #[test]
    fn test_no_model_outcome() {
        let outcome = ScoringOutcome::NoModelAvailable;
        assert!(!outcome.is_available());
        assert!(outcome.report().is_none());
        assert!(matches!(outcome.into_report(), Err(EngineError::NoModelAvailable)));
    }
}
