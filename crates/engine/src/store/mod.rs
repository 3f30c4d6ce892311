//! Data store boundary
//!
//! The engine never issues schema-specific queries: it reads inventory
//! records and writes predictions and snapshots through `MaintenanceStore`.
//! Two implementations are provided:
//! - `InMemoryStore` for tests and embedding
//! - `JsonFileStore` over a data directory exported by the database layer

mod file;
mod memory;

pub use file::{JsonFileStore, DEFAULT_SNAPSHOTS_TO_KEEP};
pub use memory::InMemoryStore;

use crate::error::EngineResult;
use crate::models::{MaintenanceRecord, Prediction, ToolRecord, UsageRecord};
use crate::snapshot::ModelSnapshot;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// Trait for inventory data stores
pub trait MaintenanceStore: Send + Sync {
    fn fetch_tools(&self) -> Result<Vec<ToolRecord>>;

    /// Usage records checked out at or after `since`
    fn fetch_usage_history(&self, since: Option<DateTime<Utc>>) -> Result<Vec<UsageRecord>>;

    /// Maintenance records dated on or after `since`
    fn fetch_maintenance_history(&self, since: Option<NaiveDate>) -> Result<Vec<MaintenanceRecord>>;

    /// Append predictions to the audit log
    fn persist_predictions(&self, predictions: &[Prediction]) -> Result<()>;

    fn persist_snapshot(&self, snapshot: &ModelSnapshot) -> Result<()>;

    /// Latest persisted snapshot, `None` if none was ever persisted.
    /// A dangling, corrupt or incompatible snapshot is a `SnapshotLoad` error.
    fn load_latest_snapshot(&self) -> EngineResult<Option<ModelSnapshot>>;
}

pub(crate) fn usage_since(records: &[UsageRecord], since: Option<DateTime<Utc>>) -> Vec<UsageRecord> {
    records
        .iter()
        .filter(|r| since.map_or(true, |s| r.checkout_time >= s))
        .cloned()
        .collect()
}

pub(crate) fn maintenance_since(
    records: &[MaintenanceRecord],
    since: Option<NaiveDate>,
) -> Vec<MaintenanceRecord> {
    records
        .iter()
        .filter(|r| since.map_or(true, |s| r.maintenance_date >= s))
        .cloned()
        .collect()
}
