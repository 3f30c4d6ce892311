//! Engine error kinds

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Training was requested with too few examples. Not fatal: the active
    /// snapshot stays in place.
    #[error("insufficient training data: {available} examples available, {required} required")]
    InsufficientData { available: usize, required: usize },

    /// A tool's features cannot be built against the bound schema.
    #[error("schema mismatch for tool {tool_code}: field `{field}` has no bucket for `{value}`")]
    SchemaMismatch {
        tool_code: String,
        field: String,
        value: String,
    },

    /// A persisted snapshot is missing, corrupt or version-incompatible.
    #[error("snapshot load failed: {0}")]
    SnapshotLoad(String),

    /// No snapshot is active; callers must suppress alerts.
    #[error("no model available")]
    NoModelAvailable,

    /// A freshly trained candidate failed holdout validation and was
    /// discarded.
    #[error("candidate snapshot rejected: {0}")]
    ValidationRejected(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Errors that leave the previous snapshot active and may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. } | EngineError::ValidationRejected(_)
        )
    }
}
