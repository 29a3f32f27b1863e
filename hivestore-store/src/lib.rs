//! SQLite-backed persistent store for Hivestore.
//!
//! Provides the durable backing file shared by the processes of one
//! application family, and the machinery around it:
//!
//! - **Store**: a single SQLite file (WAL mode) holding metadata and generic
//!   object rows; destroyable and re-creatable at the same path
//! - **Version gate**: decides from metadata alone whether an existing store
//!   satisfies a required model version
//! - **Lifecycle**: the policy-driven clear/retry state machine around the
//!   open attempt
//! - **Working contexts**: in-memory transactional views with staged edits,
//!   save observers, and remote-change merging

mod context;
mod error;
mod lifecycle;
mod store;
mod version;

pub use context::{SaveObserver, WorkingContext};
pub use error::{StoreError, StoreResult};
pub use lifecycle::{ClearPolicy, LoadReport, StoreLifecycle};
pub use store::{Store, StoreMetadata, StoredObject, FORMAT_VERSION};
pub use version::version_satisfied;
