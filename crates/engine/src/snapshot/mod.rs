//! Model snapshots
//!
//! This module provides:
//! - The immutable `ModelSnapshot` bundle with checksum validation
//! - Version compatibility checks on load
//! - The holder of the active snapshot with atomic replacement

mod holder;
mod model;

pub use holder::SnapshotHolder;
pub use model::{ModelSnapshot, TrainingMetrics, SNAPSHOT_FORMAT_VERSION};
