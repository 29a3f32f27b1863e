//! Cross-process change-sync for Hivestore.
//!
//! Processes of one application family share a persistent store but have no
//! shared memory space and no network link between them. This crate carries
//! change notifications across that gap using a shared key/value blackboard
//! as the only medium.
//!
//! # Architecture
//!
//! - **Blackboard**: the shared key/value area — liveness flags and
//!   append-ordered mailboxes of serialized change records
//! - **Codec**: turns change records into opaque blobs and back
//! - **Registry**: tracks live working contexts via non-owning references
//! - **Merge engine**: applies records to every auto-merging live context
//! - **Channel**: the per-process protocol endpoint — announce liveness,
//!   publish to live peers, drain inbound queues on signal
//!
//! # Protocol
//!
//! 1. On start, a channel flags its peer key live and drops any stale
//!    inbound queues a crashed predecessor left behind
//! 2. Every local save publishes the save's change record to the outbound
//!    queue of each peer currently flagged live (no live peers, no append)
//! 3. A signal on an inbound queue key triggers a drain: read the queue,
//!    clear it, decode each entry in order, merge into the live contexts
//!
//! Delivery is at-most-once with FIFO ordering per peer pair and nothing
//! stronger; sync failures are logged, never surfaced.

mod blackboard;
mod channel;
mod codec;
mod error;
mod file_blackboard;
mod merge;
mod registry;

pub use blackboard::{Blackboard, BlackboardValue, MemoryBlackboard};
pub use channel::{PeerSyncChannel, PeerSyncConfig};
pub use codec::{ChangeCodec, JsonChangeCodec};
pub use error::{SyncError, SyncResult};
pub use file_blackboard::FileBlackboard;
pub use merge::ChangeMergeEngine;
pub use registry::ContextRegistry;
