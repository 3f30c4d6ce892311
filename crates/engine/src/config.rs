//! Engine configuration
//!
//! Every option has a default so a partial configuration source (file or
//! environment) deserializes cleanly.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Default minimum number of labeled examples required to train
pub const DEFAULT_MIN_TRAINING_EXAMPLES: usize = 10;

/// Default weight of the gradual-wear term in the confidence blend
pub const DEFAULT_BLEND_WEIGHT: f64 = 0.5;

/// Default upper bound on the predicted failure lead time
pub const DEFAULT_MAX_FAILURE_HORIZON_DAYS: u32 = 90;

/// Largest accepted failure horizon (about a century)
pub const MAX_FAILURE_HORIZON_DAYS: u32 = 36_500;

/// Default random seed for model training
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Random forest hyper-parameters for the degradation regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; all features when unset
    pub max_features: Option<usize>,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

/// Isolation forest hyper-parameters for the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub n_trees: usize,
    /// Sub-sample drawn (without replacement) for each tree
    pub sample_size: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
        }
    }
}

/// Configuration for training and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum number of tools required before training
    pub min_training_examples: usize,
    /// Weight of the gradual-wear term (0-1); the anomaly term gets the rest
    pub confidence_blend_weight: f64,
    /// Maximum lead time for a predicted failure date
    pub max_failure_horizon_days: u32,
    /// Lead time in days at confidence 1.0; lead time scales with 1/confidence
    pub failure_lead_scale_days: f64,
    pub random_seed: u64,
    /// Share of examples held out to validate a freshly trained regressor
    pub validation_fraction: f64,
    /// Reject a candidate snapshot whose holdout RMSE exceeds this
    pub max_validation_rmse: Option<f64>,
    /// Number of features reported with each prediction
    pub top_contributors: usize,
    /// Base cost used to estimate recommended maintenance
    pub base_maintenance_cost: f64,
    pub regressor: RegressorConfig,
    pub anomaly: AnomalyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_training_examples: DEFAULT_MIN_TRAINING_EXAMPLES,
            confidence_blend_weight: DEFAULT_BLEND_WEIGHT,
            max_failure_horizon_days: DEFAULT_MAX_FAILURE_HORIZON_DAYS,
            failure_lead_scale_days: 5.0,
            random_seed: DEFAULT_RANDOM_SEED,
            validation_fraction: 0.2,
            max_validation_rmse: None,
            top_contributors: 5,
            base_maintenance_cost: 100.0,
            regressor: RegressorConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject option values the engine cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_blend_weight) {
            return Err(EngineError::InvalidInput(format!(
                "confidence_blend_weight must be within [0, 1], got {}",
                self.confidence_blend_weight
            )));
        }
        if !(1..=MAX_FAILURE_HORIZON_DAYS).contains(&self.max_failure_horizon_days) {
            return Err(EngineError::InvalidInput(format!(
                "max_failure_horizon_days must be within [1, {}], got {}",
                MAX_FAILURE_HORIZON_DAYS, self.max_failure_horizon_days
            )));
        }
        if !(self.failure_lead_scale_days.is_finite() && self.failure_lead_scale_days > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "failure_lead_scale_days must be positive, got {}",
                self.failure_lead_scale_days
            )));
        }
        if !(0.0..=0.5).contains(&self.validation_fraction) {
            return Err(EngineError::InvalidInput(format!(
                "validation_fraction must be within [0, 0.5], got {}",
                self.validation_fraction
            )));
        }
        if let Some(rmse) = self.max_validation_rmse {
            if !(rmse.is_finite() && rmse >= 0.0) {
                return Err(EngineError::InvalidInput(format!(
                    "max_validation_rmse must be a finite non-negative number, got {}",
                    rmse
                )));
            }
        }
        if self.min_training_examples < 2 {
            return Err(EngineError::InvalidInput(
                "min_training_examples must be at least 2".to_string(),
            ));
        }
        if self.regressor.n_trees == 0 || self.anomaly.n_trees == 0 {
            return Err(EngineError::InvalidInput(
                "both forests need at least one tree".to_string(),
            ));
        }
        if self.regressor.max_depth == 0 || self.anomaly.sample_size < 2 {
            return Err(EngineError::InvalidInput(
                "max_depth must be positive and sample_size at least 2".to_string(),
            ));
        }
        if self.regressor.max_features == Some(0) {
            return Err(EngineError::InvalidInput(
                "max_features must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
