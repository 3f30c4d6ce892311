//! Anomaly detection for tool usage patterns
//!
//! Flags abrupt or abnormal degradation that gradual wear does not explain,
//! by scoring how unusual a tool's feature vector is relative to the
//! trained population.

mod isolation_forest;

pub use isolation_forest::{AnomalyDetector, IsolationNode, IsolationTree, MIN_ANOMALY_SAMPLES};
