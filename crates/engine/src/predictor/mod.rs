//! Degradation prediction and risk scoring

mod forest;
mod recommendations;
mod risk;
mod tree;

pub use forest::{DegradationRegressor, MAX_CONDITION, MIN_CONDITION};
pub use recommendations::recommend;
pub use risk::{RiskConfig, RiskScorer, UNVERSIONED};
pub use tree::{RegressionTree, TreeNode};
