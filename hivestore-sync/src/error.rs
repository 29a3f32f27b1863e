//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Peer configuration violates a key invariant.
    #[error("invalid peer configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sync entry could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The channel has been torn down.
    #[error("channel closed")]
    ChannelClosed,

    /// Blackboard access failed.
    #[error("blackboard error: {0}")]
    Blackboard(String),
}
