//! Single holder of the active snapshot
//!
//! Scoring takes a cheap `Arc` clone of the active snapshot and works
//! against it for the whole pass; activation replaces the reference under a
//! write lock, so every reader sees either the old or the new snapshot in
//! full.

use super::ModelSnapshot;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SnapshotHolder {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl SnapshotHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Arc<ModelSnapshot>) -> Self {
        Self {
            current: RwLock::new(Some(snapshot)),
        }
    }

    /// The active snapshot, if any
    pub fn current(&self) -> Option<Arc<ModelSnapshot>> {
        // the guarded value is a pointer swap, never left half-written
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    pub fn current_version(&self) -> Option<String> {
        self.current().map(|s| s.version().to_string())
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// Make `snapshot` active, returning the one it replaced
    pub fn activate(&self, snapshot: Arc<ModelSnapshot>) -> Option<Arc<ModelSnapshot>> {
        let version = snapshot.version().to_string();
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            guard.replace(snapshot)
        };
        debug!(
            version = %version,
            previous = previous.as_ref().map(|s| s.version()).unwrap_or("none"),
            "Snapshot activated"
        );
        previous
    }

    /// Drop the active snapshot; scoring reports no model until the next
    /// activation
    pub fn clear(&self) -> Option<Arc<ModelSnapshot>> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_holder() {
        let holder = SnapshotHolder::new();
        assert!(holder.current().is_none());
        assert!(!holder.is_active());
        assert!(holder.current_version().is_none());
        assert!(holder.clear().is_none());
    }
}
