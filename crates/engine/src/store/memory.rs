//! In-memory store

use super::{maintenance_since, usage_since, MaintenanceStore};
use crate::error::EngineResult;
use crate::models::{MaintenanceRecord, Prediction, ToolRecord, UsageRecord};
use crate::snapshot::ModelSnapshot;
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store backed by process memory.
///
/// Snapshots are kept in serialized form so loading exercises the same
/// validation as a durable store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tools: Mutex<Vec<ToolRecord>>,
    usage: Mutex<Vec<UsageRecord>>,
    maintenance: Mutex<Vec<MaintenanceRecord>>,
    predictions: Mutex<Vec<Prediction>>,
    snapshots: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    pub fn new(
        tools: Vec<ToolRecord>,
        usage: Vec<UsageRecord>,
        maintenance: Vec<MaintenanceRecord>,
    ) -> Self {
        Self {
            tools: Mutex::new(tools),
            usage: Mutex::new(usage),
            maintenance: Mutex::new(maintenance),
            ..Default::default()
        }
    }

    pub fn set_tools(&self, tools: Vec<ToolRecord>) {
        *lock(&self.tools) = tools;
    }

    pub fn push_usage(&self, record: UsageRecord) {
        lock(&self.usage).push(record);
    }

    pub fn push_maintenance(&self, record: MaintenanceRecord) {
        lock(&self.maintenance).push(record);
    }

    /// Every prediction persisted so far, oldest first
    pub fn predictions(&self) -> Vec<Prediction> {
        lock(&self.predictions).clone()
    }

    pub fn snapshot_count(&self) -> usize {
        lock(&self.snapshots).len()
    }

    /// Store raw bytes as the latest snapshot
    pub fn put_raw_snapshot(&self, bytes: Vec<u8>) {
        lock(&self.snapshots).push(bytes);
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("store is not accepting writes");
        }
        Ok(())
    }
}

impl MaintenanceStore for InMemoryStore {
    fn fetch_tools(&self) -> Result<Vec<ToolRecord>> {
        Ok(lock(&self.tools).clone())
    }

    fn fetch_usage_history(&self, since: Option<DateTime<Utc>>) -> Result<Vec<UsageRecord>> {
        Ok(usage_since(&lock(&self.usage), since))
    }

    fn fetch_maintenance_history(&self, since: Option<NaiveDate>) -> Result<Vec<MaintenanceRecord>> {
        Ok(maintenance_since(&lock(&self.maintenance), since))
    }

    fn persist_predictions(&self, predictions: &[Prediction]) -> Result<()> {
        self.check_writable()?;
        lock(&self.predictions).extend_from_slice(predictions);
        Ok(())
    }

    fn persist_snapshot(&self, snapshot: &ModelSnapshot) -> Result<()> {
        self.check_writable()?;
        let bytes = snapshot.to_json()?;
        lock(&self.snapshots).push(bytes);
        Ok(())
    }

    fn load_latest_snapshot(&self) -> EngineResult<Option<ModelSnapshot>> {
        match lock(&self.snapshots).last() {
            Some(bytes) => ModelSnapshot::from_json(bytes).map(Some),
            None => Ok(None),
        }
    }
}
