//! Isolation forest anomaly detector
//!
//! Randomly partitions the feature space; tools that need fewer partitions
//! to isolate score as more anomalous. Needs no labels and no class balance.

use crate::config::AnomalyConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Euler-Mascheroni constant, used for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Minimum number of vectors the detector can be trained on
pub const MIN_ANOMALY_SAMPLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<IsolationNode>,
}

impl IsolationTree {
    fn fit(rows: &[&[f64]], samples: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, samples, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        rows: &[&[f64]],
        samples: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(IsolationNode::Leaf {
            size: samples.len(),
        });
        if depth >= height_limit || samples.len() <= 1 {
            return idx;
        }

        // only features that still vary inside this node can split it
        let n_features = rows[samples[0]].len();
        let ranges: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|f| {
                let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &s| {
                    let v = rows[s][f];
                    (acc.0.min(v), acc.1.max(v))
                });
                (lo < hi && lo.is_finite() && hi.is_finite()).then_some((f, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            return idx;
        }

        let (feature, lo, hi) = ranges[rng.random_range(0..ranges.len())];
        let threshold = split_threshold(lo, hi, rng);
        let (left, right): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&s| rows[s][feature] < threshold);

        let left = self.grow(rows, left, depth + 1, height_limit, rng);
        let right = self.grow(rows, right, depth + 1, height_limit, rng);
        self.nodes[idx] = IsolationNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(idx) {
                Some(IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if value < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(IsolationNode::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }

    fn is_well_formed(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, n)| match n {
                IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && threshold.is_finite()
                        && *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
                IsolationNode::Leaf { .. } => true,
            })
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetector {
    trees: Vec<IsolationTree>,
    /// Sub-sample size each tree was grown on
    sample_size: usize,
    n_features: usize,
}

impl AnomalyDetector {
    /// Fit the forest on unlabeled feature vectors
    pub fn train(vectors: &[&FeatureVector], config: &AnomalyConfig, seed: u64) -> EngineResult<Self> {
        if vectors.len() < MIN_ANOMALY_SAMPLES {
            return Err(EngineError::InsufficientData {
                available: vectors.len(),
                required: MIN_ANOMALY_SAMPLES,
            });
        }
        let n_features = vectors[0].len();
        if vectors.iter().any(|v| v.len() != n_features) {
            return Err(EngineError::InvalidInput(
                "feature vectors have inconsistent lengths".to_string(),
            ));
        }

        let rows: Vec<&[f64]> = vectors.iter().map(|v| v.values()).collect();
        let sample_size = config.sample_size.max(MIN_ANOMALY_SAMPLES).min(rows.len());
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let mut master = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(config.n_trees);
        for _ in 0..config.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random::<u64>());
            let samples = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
            trees.push(IsolationTree::fit(&rows, samples, height_limit, &mut rng));
        }

        debug!(
            trees = trees.len(),
            sample_size,
            height_limit,
            "Anomaly detector trained"
        );

        Ok(Self {
            trees,
            sample_size,
            n_features,
        })
    }

    /// Anomaly score in [0, 1]; higher is more anomalous, around 0.5 or below
    /// is typical of the training population
    pub fn score(&self, features: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let x = features.values();
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size);
        if normalizer <= 0.0 {
            return 0.0;
        }
        let score = 2f64.powf(-mean_path / normalizer);
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn is_consistent(&self) -> bool {
        !self.trees.is_empty()
            && self.sample_size >= MIN_ANOMALY_SAMPLES
            && self.trees.iter().all(|t| t.is_well_formed(self.n_features))
    }
}

/// Uniform threshold in `[lo, hi)`; interpolates when the span itself
/// overflows `f64`
fn split_threshold(lo: f64, hi: f64, rng: &mut StdRng) -> f64 {
    if (hi - lo).is_finite() {
        return rng.random_range(lo..hi);
    }
    let t: f64 = rng.random();
    (lo * (1.0 - t) + hi * t).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn vectors_from(rows: Vec<Vec<f64>>) -> Vec<FeatureVector> {
        let width = rows[0].len();
        let names: Arc<[String]> = (0..width).map(|i| format!("f{}", i)).collect::<Vec<_>>().into();
        rows.into_iter()
            .enumerate()
            .map(|(i, r)| FeatureVector::new(format!("T-{}", i), Arc::clone(&names), r))
            .collect()
    }

    fn cluster() -> Vec<Vec<f64>> {
        (0..100)
            .map(|i| vec![10.0 + (i % 10) as f64 * 0.1, 5.0 + (i / 10) as f64 * 0.1])
            .collect()
    }

    #[test]
    fn test_insufficient_samples() {
        let vectors = vectors_from(vec![vec![1.0, 2.0]]);
        let refs: Vec<&FeatureVector> = vectors.iter().collect();
        let result = AnomalyDetector::train(&refs, &AnomalyConfig::default(), 1);
        assert!(matches!(result, Err(EngineError::InsufficientData { .. })));
    }

    #[test]
    fn test_outlier_scores_higher() {
        let vectors = vectors_from(cluster());
        let refs: Vec<&FeatureVector> = vectors.iter().collect();
        let detector = AnomalyDetector::train(&refs, &AnomalyConfig::default(), 42).unwrap();

        let inlier = vectors[55].clone();
        let outlier = inlier
            .with_value("f0", 80.0)
            .and_then(|v| v.with_value("f1", -40.0))
            .unwrap();

        let inlier_score = detector.score(&inlier);
        let outlier_score = detector.score(&outlier);
        assert!(
            outlier_score > inlier_score,
            "outlier {} vs inlier {}",
            outlier_score,
            inlier_score
        );
        assert!((0.0..=1.0).contains(&inlier_score));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let vectors = vectors_from(cluster());
        let refs: Vec<&FeatureVector> = vectors.iter().collect();
        let config = AnomalyConfig {
            n_trees: 30,
            sample_size: 64,
        };
        let a = AnomalyDetector::train(&refs, &config, 11).unwrap();
        let b = AnomalyDetector::train(&refs, &config, 11).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.score(&vectors[3]), b.score(&vectors[3]));
        assert!(a.is_consistent());
    }

    #[test]
    fn test_identical_population_is_not_anomalous() {
        let vectors = vectors_from(vec![vec![1.0, 1.0]; 20]);
        let refs: Vec<&FeatureVector> = vectors.iter().collect();
        let detector = AnomalyDetector::train(&refs, &AnomalyConfig::default(), 3).unwrap();
        let score = detector.score(&vectors[0]);
        // every tree is a single leaf holding the whole sub-sample
        assert!((score - 0.5).abs() < 1e-12, "score was {}", score);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn test_extreme_feature_values_train() {
        let mut rows = cluster();
        rows.push(vec![-1e308, 1e308]);
        rows.push(vec![1e308, -1e308]);
        rows.push(vec![f64::INFINITY, 0.0]);
        let vectors = vectors_from(rows);
        let refs: Vec<&FeatureVector> = vectors.iter().collect();
        let config = AnomalyConfig {
            n_trees: 20,
            sample_size: 64,
        };
        let detector = AnomalyDetector::train(&refs, &config, 5).unwrap();
        assert!(detector.is_consistent());
        for vector in &vectors {
            assert!((0.0..=1.0).contains(&detector.score(vector)));
        }
    }

    #[test]
    fn test_split_threshold_within_span() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let t = split_threshold(-1e308, 1e308, &mut rng);
            assert!(t.is_finite() && (-1e308..=1e308).contains(&t));
            let t = split_threshold(2.0, 3.0, &mut rng);
            assert!((2.0..3.0).contains(&t));
        }
    }
}
