//! The manager facade.
//!
//! Composes the store lifecycle, the context registry, and the peer sync
//! channel behind the surface the rest of the application uses: load the
//! store, hand out working contexts, and opt into cross-process sync.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use hivestore_store::{ClearPolicy, LoadReport, Store, StoreLifecycle, WorkingContext};
use hivestore_sync::{
    Blackboard, ChangeCodec, ContextRegistry, JsonChangeCodec, PeerSyncChannel, PeerSyncConfig,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Notifications emitted by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The store loaded; `cleared` reports whether it was destroyed and
    /// recreated on the way.
    LoadCompleted { cleared: bool },
    /// The load failed terminally.
    LoadFailed { message: String },
}

/// Owns the store, the live contexts, and the sync channel of one process.
pub struct StoreManager {
    config: ManagerConfig,
    lifecycle: StoreLifecycle,
    registry: Arc<ContextRegistry>,
    store: Mutex<Option<Arc<Store>>>,
    channel: Arc<Mutex<Option<PeerSyncChannel>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ManagerEvent>>>,
}

impl StoreManager {
    /// Creates a manager. Nothing touches the disk until [`load`](Self::load).
    pub fn new(config: ManagerConfig) -> Self {
        let lifecycle = StoreLifecycle::new(config.store_path(), &config.model_version);
        Self {
            config,
            lifecycle,
            registry: Arc::new(ContextRegistry::new()),
            store: Mutex::new(None),
            channel: Arc::new(Mutex::new(None)),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Subscribes to manager notifications.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ManagerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn emit(&self, event: ManagerEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Loads the store through the recovery state machine.
    ///
    /// On success the primary context is created (auto-merge enabled) and
    /// installed in the registry, and `LoadCompleted` is emitted; on failure
    /// `LoadFailed` is emitted and the error returned. Each call resolves
    /// exactly once.
    pub async fn load(
        &self,
        required_version: Option<&str>,
        clear_policy: ClearPolicy,
    ) -> ManagerResult<LoadReport> {
        let result = self
            .lifecycle
            .load(required_version.map(str::to_owned), clear_policy)
            .await;

        match result {
            Ok((store, report)) => {
                let store = Arc::new(store);
                let primary = Arc::new(WorkingContext::new(store.clone(), "primary"));
                self.wire_save_observer(&primary);
                self.registry.set_primary(primary);
                *self.store.lock().unwrap() = Some(store);
                info!(
                    "store loaded (cleared: {}) for container {:?}",
                    report.cleared, self.config.container_name
                );
                self.emit(ManagerEvent::LoadCompleted {
                    cleared: report.cleared,
                });
                Ok(report)
            }
            Err(e) => {
                self.emit(ManagerEvent::LoadFailed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// The loaded store, if any.
    pub fn store(&self) -> Option<Arc<Store>> {
        self.store.lock().unwrap().clone()
    }

    /// The primary context, present after a successful load.
    pub fn primary_context(&self) -> Option<Arc<WorkingContext>> {
        self.registry.primary()
    }

    /// Creates a secondary context over the loaded store.
    ///
    /// The caller owns the returned context; the registry tracks it weakly,
    /// so dropping the last reference removes it from future merges.
    pub fn new_background_context(
        &self,
        label: impl Into<String>,
    ) -> ManagerResult<Arc<WorkingContext>> {
        let store = self
            .store
            .lock()
            .unwrap()
            .clone()
            .ok_or(ManagerError::NotLoaded)?;
        let context = Arc::new(WorkingContext::new(store, label));
        self.wire_save_observer(&context);
        self.registry.register(&context);
        Ok(context)
    }

    /// Forwards every non-empty save of `context` into the sync channel
    /// slot. Contexts wired before sync is enabled start publishing as soon
    /// as a channel occupies the slot.
    fn wire_save_observer(&self, context: &Arc<WorkingContext>) {
        let slot = self.channel.clone();
        context.on_save(move |record| {
            if let Some(channel) = slot.lock().unwrap().as_ref() {
                if let Err(e) = channel.publish(record.clone()) {
                    warn!("failed to publish change record: {e}");
                }
            }
        });
    }

    /// Enables cross-process sync with the default JSON codec.
    pub fn enable_sync(
        &self,
        blackboard: Arc<dyn Blackboard>,
        peers: PeerSyncConfig,
    ) -> ManagerResult<()> {
        self.enable_sync_with_codec(blackboard, Arc::new(JsonChangeCodec), peers)
    }

    /// Enables cross-process sync with a caller-supplied codec, replacing
    /// any previously running channel.
    pub fn enable_sync_with_codec(
        &self,
        blackboard: Arc<dyn Blackboard>,
        codec: Arc<dyn ChangeCodec>,
        peers: PeerSyncConfig,
    ) -> ManagerResult<()> {
        if self.store.lock().unwrap().is_none() {
            return Err(ManagerError::NotLoaded);
        }
        // Tear the previous channel down first so a same-key replacement
        // does not end with its liveness flag cleared.
        if let Some(previous) = self.channel.lock().unwrap().take() {
            previous.shutdown();
        }
        let channel = PeerSyncChannel::start(blackboard, codec, self.registry.clone(), peers);
        *self.channel.lock().unwrap() = Some(channel);
        Ok(())
    }

    /// Whether a sync channel is currently running.
    pub fn is_sync_enabled(&self) -> bool {
        self.channel.lock().unwrap().is_some()
    }

    /// Stops sync, clearing this peer's liveness flag.
    pub fn disable_sync(&self) {
        if let Some(channel) = self.channel.lock().unwrap().take() {
            channel.shutdown();
        }
    }

    /// Process-termination hook: stops sync and releases the store handle.
    /// Contexts still held by callers keep working against the store they
    /// were created over.
    pub fn shutdown(&self) {
        self.disable_sync();
        *self.store.lock().unwrap() = None;
        info!("manager for container {:?} shut down", self.config.container_name);
    }
}
