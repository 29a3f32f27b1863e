//! The cross-process peer sync channel.
//!
//! Each process instance announces itself on the blackboard with a liveness
//! flag, appends serialized change records to one outbound queue per live
//! remote peer, and drains its own inbound queues when the blackboard
//! signals them. Queues are directed edges keyed by
//! `"{sender}->{receiver}"`; the caller is responsible for choosing peer
//! keys that cannot collide across independent deployments.

use crate::blackboard::{Blackboard, BlackboardValue};
use crate::codec::ChangeCodec;
use crate::error::{SyncError, SyncResult};
use crate::merge::ChangeMergeEngine;
use crate::registry::ContextRegistry;
use hivestore_types::ChangeRecord;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Immutable peer identity configuration.
///
/// The local key and the ordered set of remote keys are fixed for the
/// lifetime of the channel; all participating processes must agree on them
/// ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSyncConfig {
    local_key: String,
    remote_keys: Vec<String>,
}

impl PeerSyncConfig {
    /// Validates and builds a peer configuration.
    ///
    /// The local key must be non-empty and distinct from every remote key;
    /// remote keys must be non-empty and are deduplicated preserving order.
    pub fn new(
        local_key: impl Into<String>,
        remote_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> SyncResult<Self> {
        let local_key = local_key.into();
        if local_key.is_empty() {
            return Err(SyncError::InvalidConfig("local key must not be empty".into()));
        }

        let mut seen = HashSet::new();
        let mut remotes = Vec::new();
        for key in remote_keys {
            let key = key.into();
            if key.is_empty() {
                return Err(SyncError::InvalidConfig("remote key must not be empty".into()));
            }
            if key == local_key {
                return Err(SyncError::InvalidConfig(format!(
                    "local key {key:?} cannot also be a remote key"
                )));
            }
            if seen.insert(key.clone()) {
                remotes.push(key);
            }
        }

        Ok(Self {
            local_key,
            remote_keys: remotes,
        })
    }

    /// This process's peer key; doubles as its liveness-flag key.
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    /// The remote peer keys, in configuration order.
    pub fn remote_keys(&self) -> &[String] {
        &self.remote_keys
    }

    /// Queue key for records flowing from `remote` to us.
    pub fn inbound_key(&self, remote: &str) -> String {
        format!("{remote}->{}", self.local_key)
    }

    /// Queue key for records flowing from us to `remote`.
    pub fn outbound_key(&self, remote: &str) -> String {
        format!("{}->{remote}", self.local_key)
    }
}

/// The per-process endpoint of the blackboard sync protocol.
pub struct PeerSyncChannel {
    blackboard: Arc<dyn Blackboard>,
    config: PeerSyncConfig,
    outbound: mpsc::UnboundedSender<ChangeRecord>,
    tasks: Vec<JoinHandle<()>>,
    torn_down: AtomicBool,
}

impl PeerSyncChannel {
    /// Announces liveness and starts the channel's background tasks.
    ///
    /// Any stale inbound queue left over from a previous run of this
    /// identity is dropped before observation begins — a prior crash could
    /// have left unconsumed entries addressed to a now-restarted peer.
    pub fn start(
        blackboard: Arc<dyn Blackboard>,
        codec: Arc<dyn ChangeCodec>,
        registry: Arc<ContextRegistry>,
        config: PeerSyncConfig,
    ) -> Self {
        blackboard.set(config.local_key(), BlackboardValue::Flag(true));
        info!(
            "peer {:?} is live ({} remote peers)",
            config.local_key(),
            config.remote_keys().len()
        );

        let mut tasks = Vec::with_capacity(config.remote_keys().len() + 1);
        for remote in config.remote_keys() {
            let key = config.inbound_key(remote);
            blackboard.remove(&key);
            let signals = blackboard.subscribe(&key);
            tasks.push(tokio::spawn(run_drain(
                blackboard.clone(),
                codec.clone(),
                registry.clone(),
                key,
                signals,
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tasks.push(tokio::spawn(run_publish(
            blackboard.clone(),
            codec,
            config.clone(),
            rx,
        )));

        Self {
            blackboard,
            config,
            outbound: tx,
            tasks,
            torn_down: AtomicBool::new(false),
        }
    }

    /// The channel's peer configuration.
    pub fn config(&self) -> &PeerSyncConfig {
        &self.config
    }

    /// Whether `peer` currently flags itself live on the blackboard.
    pub fn is_live(&self, peer: &str) -> bool {
        matches!(self.blackboard.get(peer), Some(BlackboardValue::Flag(true)))
    }

    /// Hands a change record to the publish worker.
    ///
    /// Serialization and queue appends happen on the dedicated background
    /// sequence, never on the caller — a save completion is never blocked
    /// by sync. Empty records are dropped.
    pub fn publish(&self, record: ChangeRecord) -> SyncResult<()> {
        if record.is_empty() {
            return Ok(());
        }
        self.outbound
            .send(record)
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Clears the liveness flag and stops the background tasks.
    /// Idempotent; also invoked best-effort on drop.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.blackboard
            .set(self.config.local_key(), BlackboardValue::Flag(false));
        info!("peer {:?} went offline", self.config.local_key());
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for PeerSyncChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publish worker: one record in flight at a time, preserving per-peer
/// append order.
async fn run_publish(
    blackboard: Arc<dyn Blackboard>,
    codec: Arc<dyn ChangeCodec>,
    config: PeerSyncConfig,
    mut records: mpsc::UnboundedReceiver<ChangeRecord>,
) {
    while let Some(record) = records.recv().await {
        let blackboard = blackboard.clone();
        let codec = codec.clone();
        let config = config.clone();
        let result = tokio::task::spawn_blocking(move || {
            let live: Vec<&String> = config
                .remote_keys()
                .iter()
                .filter(|remote| {
                    matches!(
                        blackboard.get(remote.as_str()),
                        Some(BlackboardValue::Flag(true))
                    )
                })
                .collect();
            if live.is_empty() {
                debug!(
                    "no live peers; dropping change record ({} ids)",
                    record.len()
                );
                return;
            }

            let bytes = match codec.encode(&record) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("failed to encode change record: {e}");
                    return;
                }
            };
            for remote in live {
                blackboard.append(&config.outbound_key(remote), bytes.clone());
            }
        })
        .await;
        if let Err(e) = result {
            warn!("publish worker panicked: {e}");
        }
    }
}

/// Drain loop for one inbound queue key.
async fn run_drain(
    blackboard: Arc<dyn Blackboard>,
    codec: Arc<dyn ChangeCodec>,
    registry: Arc<ContextRegistry>,
    key: String,
    mut signals: mpsc::UnboundedReceiver<String>,
) {
    while signals.recv().await.is_some() {
        // Read-then-clear: two separate blackboard operations. A concurrent
        // cross-process append between them is lost; the blackboard offers
        // no atomic take.
        let entries = match blackboard.get(&key) {
            Some(BlackboardValue::Queue(entries)) => entries,
            Some(BlackboardValue::Flag(_)) | None => continue,
        };
        blackboard.remove(&key);
        if entries.is_empty() {
            continue;
        }
        debug!("draining {} entries from {key}", entries.len());

        let codec = codec.clone();
        let registry = registry.clone();
        let drain_key = key.clone();
        let result = tokio::task::spawn_blocking(move || {
            let engine = ChangeMergeEngine::new();
            for (index, entry) in entries.iter().enumerate() {
                match codec.decode(entry) {
                    Ok(record) => {
                        engine.apply_to_registry(&record, &registry);
                    }
                    Err(e) => {
                        warn!("skipping undecodable sync entry {index} on {drain_key}: {e}");
                    }
                }
            }
        })
        .await;
        if let Err(e) = result {
            warn!("drain worker panicked: {e}");
        }
    }
}
