//! Error types for the store layer.

use hivestore_types::ObjectId;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The required model version is absent from the store metadata and the
    /// clear policy forbids recovery.
    #[error("store does not contain required model version {0:?}")]
    VersionMismatch(String),

    /// Opening (or migrating) the store failed.
    #[error("store open failed: {0}")]
    OpenFailed(String),

    /// Destroying the store failed.
    #[error("store destroy failed: {0}")]
    DestroyFailed(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored row carries data that cannot be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Object not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),
}
