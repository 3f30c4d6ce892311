//! JSON file store over a data directory
//!
//! Layout:
//! - `tools.json`, `usage_history.json`, `maintenance_history.json` hold
//!   the inventory tables as JSON arrays
//! - `predictions.jsonl` is the append-only prediction log
//! - `snapshots/snapshot-<version>.json` with a `snapshots/LATEST` pointer

use super::{maintenance_since, usage_since, MaintenanceStore};
use crate::error::{EngineError, EngineResult};
use crate::models::{MaintenanceRecord, Prediction, ToolRecord, UsageRecord};
use crate::snapshot::ModelSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TOOLS_FILE: &str = "tools.json";
pub const USAGE_FILE: &str = "usage_history.json";
pub const MAINTENANCE_FILE: &str = "maintenance_history.json";
pub const PREDICTIONS_FILE: &str = "predictions.jsonl";
const SNAPSHOT_DIR: &str = "snapshots";
const LATEST_POINTER: &str = "LATEST";

/// Number of persisted snapshots kept for rollback
pub const DEFAULT_SNAPSHOTS_TO_KEEP: usize = 5;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    snapshots_to_keep: usize,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating the directory layout
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let snapshot_dir = root.join(SNAPSHOT_DIR);
        fs::create_dir_all(&snapshot_dir)
            .with_context(|| format!("Failed to create snapshot directory {:?}", snapshot_dir))?;
        Ok(Self {
            root,
            snapshots_to_keep: DEFAULT_SNAPSHOTS_TO_KEEP,
        })
    }

    pub fn with_snapshots_to_keep(mut self, keep: usize) -> Self {
        self.snapshots_to_keep = keep.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_tools(&self, tools: &[ToolRecord]) -> Result<()> {
        self.write_table(TOOLS_FILE, tools)
    }

    pub fn write_usage_history(&self, usage: &[UsageRecord]) -> Result<()> {
        self.write_table(USAGE_FILE, usage)
    }

    pub fn write_maintenance_history(&self, maintenance: &[MaintenanceRecord]) -> Result<()> {
        self.write_table(MAINTENANCE_FILE, maintenance)
    }

    /// Read back the prediction log, oldest first
    pub fn read_predictions(&self) -> Result<Vec<Prediction>> {
        let path = self.root.join(PREDICTIONS_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid prediction on line {} of {:?}", i + 1, path))
            })
            .collect()
    }

    /// Versions of the persisted snapshots, oldest first
    pub fn snapshot_versions(&self) -> Result<Vec<String>> {
        let dir = self.root.join(SNAPSHOT_DIR);
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {:?}", dir))? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(version) = name
                .strip_prefix("snapshot-")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                versions.push(version.to_string());
            }
        }
        // version strings embed a sortable UTC timestamp
        versions.sort();
        Ok(versions)
    }

    fn snapshot_path(&self, version: &str) -> PathBuf {
        self.root
            .join(SNAPSHOT_DIR)
            .join(format!("snapshot-{}.json", version))
    }

    fn read_table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.root.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Table file missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };
        serde_json::from_slice(&bytes).with_context(|| format!("Invalid records in {:?}", path))
    }

    fn write_table<T: Serialize>(&self, name: &str, records: &[T]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).context("Failed to serialize records")?;
        write_atomic(&self.root.join(name), &json)
    }

    fn prune_snapshots(&self, keep_version: &str) {
        let versions = match self.snapshot_versions() {
            Ok(versions) => versions,
            Err(e) => {
                warn!(error = %e, "Failed to list snapshots for pruning");
                return;
            }
        };
        let excess = versions.len().saturating_sub(self.snapshots_to_keep);
        for version in versions.iter().take(excess) {
            if version == keep_version {
                continue;
            }
            let path = self.snapshot_path(version);
            if let Err(e) = fs::remove_file(&path) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove old snapshot file"
                );
            }
        }
    }
}

impl MaintenanceStore for JsonFileStore {
    fn fetch_tools(&self) -> Result<Vec<ToolRecord>> {
        self.read_table(TOOLS_FILE)
    }

    fn fetch_usage_history(&self, since: Option<DateTime<Utc>>) -> Result<Vec<UsageRecord>> {
        let records: Vec<UsageRecord> = self.read_table(USAGE_FILE)?;
        Ok(usage_since(&records, since))
    }

    fn fetch_maintenance_history(&self, since: Option<NaiveDate>) -> Result<Vec<MaintenanceRecord>> {
        let records: Vec<MaintenanceRecord> = self.read_table(MAINTENANCE_FILE)?;
        Ok(maintenance_since(&records, since))
    }

    fn persist_predictions(&self, predictions: &[Prediction]) -> Result<()> {
        if predictions.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for prediction in predictions {
            serde_json::to_writer(&mut buf, prediction).context("Failed to serialize prediction")?;
            buf.push(b'\n');
        }

        let path = self.root.join(PREDICTIONS_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open prediction log {:?}", path))?;
        file.write_all(&buf)
            .context("Failed to append predictions")?;
        file.sync_all().context("Failed to sync prediction log")?;
        Ok(())
    }

    fn persist_snapshot(&self, snapshot: &ModelSnapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;
        write_atomic(&self.snapshot_path(snapshot.version()), &bytes)?;
        write_atomic(
            &self.root.join(SNAPSHOT_DIR).join(LATEST_POINTER),
            snapshot.version().as_bytes(),
        )?;
        self.prune_snapshots(snapshot.version());
        Ok(())
    }

    fn load_latest_snapshot(&self) -> EngineResult<Option<ModelSnapshot>> {
        let pointer = self.root.join(SNAPSHOT_DIR).join(LATEST_POINTER);
        let version = match fs::read_to_string(&pointer) {
            Ok(version) => version.trim().to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::SnapshotLoad(format!(
                    "failed to read {:?}: {}",
                    pointer, e
                )))
            }
        };
        let path = self.snapshot_path(&version);
        let bytes = fs::read(&path).map_err(|e| {
            EngineError::SnapshotLoad(format!("snapshot {} unreadable at {:?}: {}", version, path, e))
        })?;
        ModelSnapshot::from_json(&bytes).map(Some)
    }
}

/// Write through a temp file and rename so readers never see a partial file
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(data)
        .with_context(|| format!("Failed to write {:?}", temp_path))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
    Ok(())
}
