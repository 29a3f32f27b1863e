//! Facade for Hivestore.
//!
//! A [`StoreManager`] owns one process's view of the shared persistent
//! store: it drives the policy-based load/recovery sequence, hands out
//! working contexts (the primary plus caller-owned background ones), and —
//! once sync is enabled — carries every save's change record to the other
//! live processes of the application family over the blackboard.
//!
//! # Example
//!
//! ```no_run
//! use hivestore_manager::{ClearPolicy, ManagerConfig, StoreManager};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = StoreManager::new(ManagerConfig {
//!     container_name: "notes".into(),
//!     model_version: "v2".into(),
//!     ..Default::default()
//! });
//!
//! let report = manager.load(Some("v2"), ClearPolicy::IfMigrationFails).await?;
//! if report.cleared {
//!     // The store was incompatible and has been recreated empty.
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod manager;

pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult};
pub use manager::{ManagerEvent, StoreManager};

// Re-exported surface of the underlying crates.
pub use hivestore_store::{
    ClearPolicy, LoadReport, Store, StoreError, StoredObject, WorkingContext,
};
pub use hivestore_sync::{
    Blackboard, BlackboardValue, ChangeCodec, FileBlackboard, JsonChangeCodec, MemoryBlackboard,
    PeerSyncConfig, SyncError,
};
pub use hivestore_types::{ChangeRecord, ObjectId};
