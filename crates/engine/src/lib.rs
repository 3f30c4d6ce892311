//! Predictive maintenance engine for tool inventories
//!
//! This crate provides the core functionality for:
//! - Feature engineering from tool, usage and maintenance records
//! - Degradation regression with a seeded random forest
//! - Usage anomaly scoring with an isolation forest
//! - Risk scoring, priority tiers and maintenance recommendations
//! - Versioned model snapshots with atomic activation
//! - Observability (metrics and structured logs)

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod snapshot;
pub mod store;

pub use config::EngineConfig;
pub use engine::{MaintenanceEngine, ScoringOutcome, ScoringReport, ToolFailure, TrainingReport};
pub use error::{EngineError, EngineResult};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use snapshot::{ModelSnapshot, SnapshotHolder};
pub use store::{InMemoryStore, JsonFileStore, MaintenanceStore};
