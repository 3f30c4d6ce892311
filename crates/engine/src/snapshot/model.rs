//! Immutable, versioned bundle of trained model parameters

use crate::anomaly::AnomalyDetector;
use crate::error::{EngineError, EngineResult};
use crate::features::{FeatureSchema, FEATURE_SCHEMA_VERSION};
use crate::predictor::DegradationRegressor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serialized layout version of `ModelSnapshot`
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Checksum characters appended to the snapshot version
const VERSION_CHECKSUM_CHARS: usize = 8;

/// Holdout evaluation of the regressor at training time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub training_size: usize,
    pub holdout_size: usize,
    pub holdout_rmse: Option<f64>,
    pub holdout_r2: Option<f64>,
}

/// Trained parameters plus the feature schema they assume.
///
/// Fields are private: once built, a snapshot never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    format_version: u32,
    version: String,
    schema: FeatureSchema,
    regressor: DegradationRegressor,
    detector: AnomalyDetector,
    trained_at: DateTime<Utc>,
    training_set_size: usize,
    metrics: TrainingMetrics,
    /// SHA-256 over schema and model parameters
    checksum: String,
}

#[derive(Serialize)]
struct ChecksummedParts<'a> {
    schema: &'a FeatureSchema,
    regressor: &'a DegradationRegressor,
    detector: &'a AnomalyDetector,
}

impl ModelSnapshot {
    pub fn new(
        schema: FeatureSchema,
        regressor: DegradationRegressor,
        detector: AnomalyDetector,
        trained_at: DateTime<Utc>,
        training_set_size: usize,
        metrics: TrainingMetrics,
    ) -> EngineResult<Self> {
        let width = schema.width();
        if regressor.n_features() != width || detector.n_features() != width {
            return Err(EngineError::InvalidInput(format!(
                "models trained on {}/{} features but schema has {}",
                regressor.n_features(),
                detector.n_features(),
                width
            )));
        }
        let checksum = parameters_checksum(&schema, &regressor, &detector)
            .map_err(|e| EngineError::InvalidInput(format!("unserializable parameters: {}", e)))?;
        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            version: snapshot_version(&schema, trained_at, &checksum),
            schema,
            regressor,
            detector,
            trained_at,
            training_set_size,
            metrics,
            checksum,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn regressor(&self) -> &DegradationRegressor {
        &self.regressor
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn training_set_size(&self) -> usize {
        self.training_set_size
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Regressor feature importances keyed by schema feature names
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.regressor.feature_importances(&self.schema.feature_names())
    }

    pub fn to_json(&self) -> EngineResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| EngineError::InvalidInput(format!("failed to serialize snapshot: {}", e)))
    }

    /// Decode and validate a persisted snapshot
    pub fn from_json(bytes: &[u8]) -> EngineResult<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::SnapshotLoad(format!("corrupt snapshot: {}", e)))?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Check version compatibility, checksum and structural consistency
    pub fn verify(&self) -> EngineResult<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(EngineError::SnapshotLoad(format!(
                "snapshot format {} is not supported (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if !self.schema.is_compatible() {
            return Err(EngineError::SnapshotLoad(format!(
                "feature schema version {} is not supported (expected {})",
                self.schema.version, FEATURE_SCHEMA_VERSION
            )));
        }
        let computed = parameters_checksum(&self.schema, &self.regressor, &self.detector)
            .map_err(|e| EngineError::SnapshotLoad(e.to_string()))?;
        if computed != self.checksum {
            return Err(EngineError::SnapshotLoad(format!(
                "checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }
        let expected_version = snapshot_version(&self.schema, self.trained_at, &self.checksum);
        if self.version != expected_version {
            return Err(EngineError::SnapshotLoad(format!(
                "snapshot version {} does not match its parameters ({})",
                self.version, expected_version
            )));
        }
        let width = self.schema.width();
        if self.regressor.n_features() != width
            || self.detector.n_features() != width
            || !self.regressor.is_consistent()
            || !self.detector.is_consistent()
        {
            return Err(EngineError::SnapshotLoad(
                "model parameters do not match the feature schema".to_string(),
            ));
        }
        Ok(())
    }
}

/// `v<schema>-<timestamp>-<checksum prefix>`: sorts by training time and
/// stays distinct for same-second trainings on different data
fn snapshot_version(schema: &FeatureSchema, trained_at: DateTime<Utc>, checksum: &str) -> String {
    let suffix = checksum.get(..VERSION_CHECKSUM_CHARS).unwrap_or(checksum);
    format!(
        "v{}-{}-{}",
        schema.version,
        trained_at.format("%Y%m%dT%H%M%SZ"),
        suffix
    )
}

fn parameters_checksum(
    schema: &FeatureSchema,
    regressor: &DegradationRegressor,
    detector: &AnomalyDetector,
) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(&ChecksummedParts {
        schema,
        regressor,
        detector,
    })?;
    Ok(compute_checksum(&bytes))
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
