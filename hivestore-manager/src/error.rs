//! Error types for the manager facade.

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors surfaced by the manager facade.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// An operation required a loaded store.
    #[error("store is not loaded")]
    NotLoaded,

    /// Store lifecycle error.
    #[error(transparent)]
    Store(#[from] hivestore_store::StoreError),

    /// Sync configuration error.
    #[error(transparent)]
    Sync(#[from] hivestore_sync::SyncError),
}
