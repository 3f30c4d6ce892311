//! Degradation regressor
//!
//! A bagged ensemble of regression trees predicting a tool's condition score
//! from its wear profile. Each tree is fit on a bootstrap sample drawn from a
//! per-tree seed, so a fixed seed and training set always reproduce the same
//! parameters.

use super::tree::{RegressionTree, TrainingData, TreeParams};
use crate::config::RegressorConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower bound of the condition score domain
pub const MIN_CONDITION: f64 = 0.0;

/// Upper bound of the condition score domain
pub const MAX_CONDITION: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationRegressor {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Normalized impurity decrease per feature index
    feature_importances: Vec<f64>,
}

impl DegradationRegressor {
    /// Fit the ensemble on feature vectors and their observed condition scores
    pub fn train(
        vectors: &[&FeatureVector],
        targets: &[f64],
        config: &RegressorConfig,
        seed: u64,
    ) -> EngineResult<Self> {
        if vectors.is_empty() {
            return Err(EngineError::InsufficientData {
                available: 0,
                required: 1,
            });
        }
        if vectors.len() != targets.len() {
            return Err(EngineError::InvalidInput(format!(
                "{} feature vectors but {} targets",
                vectors.len(),
                targets.len()
            )));
        }
        if let Some(bad) = targets.iter().find(|t| !t.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "non-finite condition target {}",
                bad
            )));
        }
        let n_features = vectors[0].len();
        if vectors.iter().any(|v| v.len() != n_features) {
            return Err(EngineError::InvalidInput(
                "feature vectors have inconsistent lengths".to_string(),
            ));
        }

        let rows: Vec<&[f64]> = vectors.iter().map(|v| v.values()).collect();
        let data = TrainingData {
            rows: &rows,
            targets,
            n_features,
        };
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: config.max_features,
        };

        let n = rows.len();
        let mut master = StdRng::seed_from_u64(seed);
        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(config.n_trees);

        for _ in 0..config.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random::<u64>());
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            trees.push(RegressionTree::fit(
                &data,
                bootstrap,
                &params,
                &mut rng,
                &mut importances,
            ));
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            trees = trees.len(),
            examples = n,
            features = n_features,
            "Degradation regressor trained"
        );

        Ok(Self {
            trees,
            n_features,
            feature_importances: importances,
        })
    }

    /// Predicted condition score, clipped to [0, 100]
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return MAX_CONDITION;
        }
        let x = features.values();
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        let mean = sum / self.trees.len() as f64;
        if mean.is_finite() {
            mean.clamp(MIN_CONDITION, MAX_CONDITION)
        } else {
            MIN_CONDITION
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Importances keyed by feature name, highest first
    pub fn feature_importances(&self, names: &[String]) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = names
            .iter()
            .zip(&self.feature_importances)
            .map(|(name, &importance)| (name.clone(), importance))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Structural check used when loading persisted parameters
    pub(crate) fn is_consistent(&self) -> bool {
        !self.trees.is_empty()
            && self.feature_importances.len() == self.n_features
            && self.trees.iter().all(|t| {
                t.is_well_formed() && t.max_feature().map_or(true, |f| f < self.n_features)
            })
    }
}
