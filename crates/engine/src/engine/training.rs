//! Candidate snapshot training
//!
//! Builds the feature schema from the current inventory, fits the regressor
//! on a seeded training split and the detector on the whole population, and
//! validates the regressor on the holdout split before a snapshot is built.

use super::ToolFailure;
use crate::anomaly::AnomalyDetector;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::{FeatureBuilder, FeatureSchema, FeatureVector};
use crate::models::{MaintenanceRecord, ToolRecord, UsageRecord};
use crate::predictor::DegradationRegressor;
use crate::snapshot::{ModelSnapshot, TrainingMetrics};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::thread;
use tracing::{debug, warn};

/// A trained, validated snapshot that has not been activated yet
#[derive(Debug)]
pub struct TrainedSnapshot {
    pub snapshot: ModelSnapshot,
    /// Tools left out of the training population
    pub skipped: Vec<ToolFailure>,
}

/// Summary of a training run that activated a new snapshot
#[derive(Debug)]
pub struct TrainingReport {
    pub version: String,
    pub previous_version: Option<String>,
    pub metrics: TrainingMetrics,
    pub skipped: Vec<ToolFailure>,
    pub duration_secs: f64,
}

/// Train a candidate snapshot from inventory records.
///
/// Pure apart from logging: the result depends only on the records, the
/// configuration (including `random_seed`) and `trained_at`.
pub fn train_snapshot(
    config: &EngineConfig,
    tools: &[ToolRecord],
    usage_history: &[UsageRecord],
    maintenance_history: &[MaintenanceRecord],
    trained_at: DateTime<Utc>,
) -> EngineResult<TrainedSnapshot> {
    config.validate()?;
    let required = config.min_training_examples;
    if tools.len() < required {
        return Err(EngineError::InsufficientData {
            available: tools.len(),
            required,
        });
    }

    let schema = FeatureSchema::from_tools(tools);
    let builder = FeatureBuilder::new(schema, trained_at.date_naive());
    let set = builder.build(tools, usage_history, maintenance_history)?;

    let mut skipped: Vec<ToolFailure> = set
        .rejected
        .into_iter()
        .map(|(tool_code, error)| ToolFailure { tool_code, error })
        .collect();

    // duplicates resolve to the last record, matching the feature builder
    let labels: HashMap<&str, f64> = tools
        .iter()
        .map(|t| (t.tool_code.as_str(), t.condition_score))
        .collect();

    let mut examples: Vec<(&FeatureVector, f64)> = Vec::with_capacity(set.vectors.len());
    for (code, vector) in &set.vectors {
        match labels.get(code.as_str()) {
            Some(&label) if label.is_finite() => {
                examples.push((vector, label.clamp(0.0, 100.0)));
            }
            _ => {
                warn!(tool_code = %code, "Tool has no usable condition score, excluded from training");
                skipped.push(ToolFailure {
                    tool_code: code.clone(),
                    error: EngineError::InvalidInput(format!(
                        "tool {} has no finite condition score",
                        code
                    )),
                });
            }
        }
    }
    if examples.len() < required {
        return Err(EngineError::InsufficientData {
            available: examples.len(),
            required,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let (train_idx, holdout_idx) = split_holdout(examples.len(), config.validation_fraction, &mut rng);
    let regressor_seed = rng.random::<u64>();
    let detector_seed = rng.random::<u64>();

    let train_vectors: Vec<&FeatureVector> = train_idx.iter().map(|&i| examples[i].0).collect();
    let train_targets: Vec<f64> = train_idx.iter().map(|&i| examples[i].1).collect();
    let population: Vec<&FeatureVector> = examples.iter().map(|(v, _)| *v).collect();

    // the two models are independent; fit them side by side
    let (regressor, detector) = thread::scope(|s| {
        let detector =
            s.spawn(|| AnomalyDetector::train(&population, &config.anomaly, detector_seed));
        let regressor = DegradationRegressor::train(
            &train_vectors,
            &train_targets,
            &config.regressor,
            regressor_seed,
        );
        let detector = detector
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (regressor, detector)
    });
    let (regressor, detector) = (regressor?, detector?);

    let holdout: Vec<(&FeatureVector, f64)> = holdout_idx.iter().map(|&i| examples[i]).collect();
    let metrics = evaluate(&regressor, &holdout, train_idx.len());
    validate(config, &regressor, &holdout, &metrics)?;

    debug!(
        training_size = metrics.training_size,
        holdout_size = metrics.holdout_size,
        holdout_rmse = ?metrics.holdout_rmse,
        "Candidate models trained"
    );

    let snapshot = ModelSnapshot::new(
        builder.schema().clone(),
        regressor,
        detector,
        trained_at,
        examples.len(),
        metrics,
    )?;
    Ok(TrainedSnapshot { snapshot, skipped })
}

/// Seeded shuffle into (training, holdout) index sets. The holdout is empty
/// when it would leave fewer than two training examples.
fn split_holdout(n: usize, fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let holdout_len = (n as f64 * fraction).floor() as usize;
    if holdout_len == 0 || n - holdout_len < 2 {
        return (indices, Vec::new());
    }
    let holdout = indices.split_off(n - holdout_len);
    (indices, holdout)
}

fn evaluate(
    regressor: &DegradationRegressor,
    holdout: &[(&FeatureVector, f64)],
    training_size: usize,
) -> TrainingMetrics {
    if holdout.is_empty() {
        return TrainingMetrics {
            training_size,
            ..Default::default()
        };
    }

    let n = holdout.len() as f64;
    let sse: f64 = holdout
        .iter()
        .map(|(v, y)| (regressor.predict(v) - y).powi(2))
        .sum();
    let mean = holdout.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sst: f64 = holdout.iter().map(|(_, y)| (y - mean).powi(2)).sum();

    TrainingMetrics {
        training_size,
        holdout_size: holdout.len(),
        holdout_rmse: Some((sse / n).sqrt()),
        holdout_r2: (sst > f64::EPSILON).then(|| 1.0 - sse / sst),
    }
}

fn validate(
    config: &EngineConfig,
    regressor: &DegradationRegressor,
    holdout: &[(&FeatureVector, f64)],
    metrics: &TrainingMetrics,
) -> EngineResult<()> {
    if holdout.iter().any(|(v, _)| !regressor.predict(v).is_finite()) {
        return Err(EngineError::ValidationRejected(
            "regressor produced non-finite holdout predictions".to_string(),
        ));
    }
    if let (Some(rmse), Some(max)) = (metrics.holdout_rmse, config.max_validation_rmse) {
        if !rmse.is_finite() || rmse > max {
            return Err(EngineError::ValidationRejected(format!(
                "holdout RMSE {:.3} exceeds {:.3}",
                rmse, max
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolStatus;
    use chrono::{NaiveDate, TimeZone};

    fn trained_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.regressor.n_trees = 10;
        config.anomaly.n_trees = 10;
        config
    }

    fn fleet(n: usize) -> Vec<ToolRecord> {
        (0..n)
            .map(|i| ToolRecord {
                tool_code: format!("T-{:03}", i),
                category: if i % 2 == 0 { "Drill" } else { "Saw" }.to_string(),
                location: "Depot".to_string(),
                purchase_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                condition_score: 100.0 - i as f64 * 2.5,
                usage_hours: i as f64 * 10.0,
                last_maintenance_date: None,
                status: ToolStatus::Available,
            })
            .collect()
    }

    #[test]
    fn test_insufficient_tools() {
        let result = train_snapshot(&small_config(), &fleet(4), &[], &[], trained_at());
        match result {
            Err(EngineError::InsufficientData {
                available,
                required,
            }) => {
                assert_eq!(available, 4);
                assert_eq!(required, 10);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|t| t.snapshot)),
        }
    }

    #[test]
    fn test_unlabeled_tools_count_against_minimum() {
        let mut tools = fleet(10);
        tools[3].condition_score = f64::NAN;
        let result = train_snapshot(&small_config(), &tools, &[], &[], trained_at());
        assert!(matches!(
            result,
            Err(EngineError::InsufficientData { available: 9, .. })
        ));
    }

    #[test]
    fn test_trains_with_holdout() {
        let trained = train_snapshot(&small_config(), &fleet(20), &[], &[], trained_at()).unwrap();
        let metrics = trained.snapshot.metrics();
        assert_eq!(metrics.holdout_size, 4);
        assert_eq!(metrics.training_size, 16);
        assert!(metrics.holdout_rmse.is_some());
        assert_eq!(trained.snapshot.training_set_size(), 20);
        let version = trained.snapshot.version();
        assert!(version.starts_with("v1-20260601T000000Z-"), "{}", version);
        assert!(trained.snapshot.checksum().starts_with(&version[20..]));
        assert!(trained.skipped.is_empty());
    }

    #[test]
    fn test_rmse_gate_rejects_candidate() {
        let mut config = small_config();
        config.max_validation_rmse = Some(0.0);
        // a noisy label guarantees a non-zero holdout error
        let mut tools = fleet(20);
        for (i, tool) in tools.iter_mut().enumerate() {
            tool.condition_score = if i % 3 == 0 { 10.0 } else { 90.0 };
        }
        let result = train_snapshot(&config, &tools, &[], &[], trained_at());
        assert!(matches!(result, Err(EngineError::ValidationRejected(_))));
    }

    #[test]
    fn test_split_holdout() {
        let mut rng = StdRng::seed_from_u64(1);
        let (train, holdout) = split_holdout(10, 0.2, &mut rng);
        assert_eq!(train.len(), 8);
        assert_eq!(holdout.len(), 2);
        let mut all: Vec<usize> = train.iter().chain(&holdout).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        let (train, holdout) = split_holdout(2, 0.5, &mut rng);
        assert_eq!(train.len(), 2);
        assert!(holdout.is_empty());

        let (train, holdout) = split_holdout(10, 0.0, &mut rng);
        assert_eq!(train.len(), 10);
        assert!(holdout.is_empty());
    }
}
