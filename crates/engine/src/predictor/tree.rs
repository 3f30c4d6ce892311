//! CART regression tree with variance-reduction splits

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Minimum sum-of-squares reduction for a split to be kept
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
}

/// Training rows shared by every tree in a forest
pub(crate) struct TrainingData<'a> {
    pub rows: &'a [&'a [f64]],
    pub targets: &'a [f64],
    pub n_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree over `samples` (indices into `data`, repeats allowed).
    /// Sum-of-squares reductions are accumulated into `importances`.
    pub(crate) fn fit(
        data: &TrainingData<'_>,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, samples, 0, params, rng, importances);
        tree
    }

    fn grow(
        &mut self,
        data: &TrainingData<'_>,
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> usize {
        let idx = self.nodes.len();
        let mean = samples.iter().map(|&s| data.targets[s]).sum::<f64>() / samples.len() as f64;
        self.nodes.push(TreeNode::Leaf { value: mean });

        if depth >= params.max_depth || samples.len() < params.min_samples_split.max(2) {
            return idx;
        }
        let Some(split) = best_split(data, &samples, params, rng) else {
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| data.rows[s][split.feature] <= split.threshold);
        importances[split.feature] += split.gain;

        let left = self.grow(data, left, depth + 1, params, rng, importances);
        let right = self.grow(data, right, depth + 1, params, rng, importances);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Highest feature index referenced by any split
    pub(crate) fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }

    /// All child links point forward and stay in bounds
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, n)| match n {
                TreeNode::Split {
                    left,
                    right,
                    threshold,
                    ..
                } => {
                    *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                        && threshold.is_finite()
                }
                TreeNode::Leaf { value } => value.is_finite(),
            })
    }
}

fn best_split(
    data: &TrainingData<'_>,
    samples: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<Split> {
    let mut candidates: Vec<usize> = (0..data.n_features).collect();
    let budget = match params.max_features {
        Some(k) if k < data.n_features => {
            candidates.shuffle(rng);
            k
        }
        _ => data.n_features,
    };

    let total_sum: f64 = samples.iter().map(|&s| data.targets[s]).sum();
    let n = samples.len() as f64;
    let parent_score = total_sum * total_sum / n;

    let mut best: Option<Split> = None;
    let mut evaluated = 0;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(samples.len());

    for feature in candidates {
        if evaluated >= budget {
            break;
        }
        pairs.clear();
        pairs.extend(samples.iter().map(|&s| (data.rows[s][feature], data.targets[s])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // constant features do not count against the budget
        if pairs[0].0 == pairs[pairs.len() - 1].0 {
            continue;
        }
        evaluated += 1;

        let mut left_sum = 0.0;
        for i in 0..pairs.len() - 1 {
            left_sum += pairs[i].1;
            let (current, next) = (pairs[i].0, pairs[i + 1].0);
            if current == next {
                continue;
            }
            let n_left = (i + 1) as f64;
            let n_right = n - n_left;
            let right_sum = total_sum - left_sum;
            let gain =
                left_sum * left_sum / n_left + right_sum * right_sum / n_right - parent_score;

            if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                let mid = current + (next - current) / 2.0;
                let threshold = if mid < next { mid } else { current };
                best = Some(Split {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }
    best
}
