//! Working contexts: in-memory transactional views over the store.
//!
//! A context stages local edits, commits them in one store transaction on
//! save, and keeps a cache of the object rows it has faulted in. Remote
//! change records merge into the cache without touching staged local edits.

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, StoredObject};
use hivestore_types::{ChangeRecord, ObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Callback invoked with the change record of every non-empty save.
pub type SaveObserver = Arc<dyn Fn(&ChangeRecord) + Send + Sync>;

#[derive(Default)]
struct PendingChanges {
    inserted: HashMap<ObjectId, StoredObject>,
    updated: HashMap<ObjectId, StoredObject>,
    deleted: HashSet<ObjectId>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// An in-memory transactional view over a shared [`Store`].
pub struct WorkingContext {
    store: Arc<Store>,
    label: String,
    auto_merge: AtomicBool,
    /// Rows this context has materialized, keyed by identifier.
    registered: Mutex<HashMap<ObjectId, StoredObject>>,
    pending: Mutex<PendingChanges>,
    save_observers: Mutex<Vec<SaveObserver>>,
}

impl std::fmt::Debug for WorkingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingContext")
            .field("label", &self.label)
            .field("auto_merge", &self.auto_merge.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl WorkingContext {
    /// Creates a context over `store`. Auto-merge defaults to enabled.
    pub fn new(store: Arc<Store>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
            auto_merge: AtomicBool::new(true),
            registered: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingChanges::default()),
            save_observers: Mutex::new(Vec::new()),
        }
    }

    /// The context's display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether remote change records are merged into this context.
    pub fn auto_merges_changes(&self) -> bool {
        self.auto_merge.load(Ordering::Relaxed)
    }

    /// Enables or disables merging of remote change records.
    pub fn set_auto_merge(&self, enabled: bool) {
        self.auto_merge.store(enabled, Ordering::Relaxed);
    }

    /// Registers an observer invoked after every non-empty save.
    pub fn on_save(&self, observer: impl Fn(&ChangeRecord) + Send + Sync + 'static) {
        self.save_observers.lock().unwrap().push(Arc::new(observer));
    }

    // ── Local editing ────────────────────────────────────────────

    /// Stages a new object and returns its identifier.
    pub fn create(&self, kind: impl Into<String>, data: serde_json::Value) -> ObjectId {
        let id = ObjectId::new();
        let now = now_millis();
        let object = StoredObject {
            id,
            kind: kind.into(),
            data,
            created_at: now,
            modified_at: now,
        };
        self.pending.lock().unwrap().inserted.insert(id, object);
        id
    }

    /// Returns the object for `id`, consulting staged edits first, then the
    /// registered cache, then faulting the row in from the store.
    pub fn object(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        {
            let pending = self.pending.lock().unwrap();
            if pending.deleted.contains(id) {
                return Ok(None);
            }
            if let Some(object) = pending.inserted.get(id).or_else(|| pending.updated.get(id)) {
                return Ok(Some(object.clone()));
            }
        }
        if let Some(object) = self.registered.lock().unwrap().get(id) {
            return Ok(Some(object.clone()));
        }
        match self.store.get_object(id)? {
            Some(object) => {
                self.registered.lock().unwrap().insert(*id, object.clone());
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    /// Stages a payload update for an existing object.
    pub fn update(&self, id: &ObjectId, data: serde_json::Value) -> StoreResult<()> {
        let now = now_millis();
        {
            let mut pending = self.pending.lock().unwrap();
            if pending.deleted.contains(id) {
                return Err(StoreError::NotFound(*id));
            }
            if let Some(object) = pending.inserted.get_mut(id) {
                object.data = data;
                object.modified_at = now;
                return Ok(());
            }
            if let Some(object) = pending.updated.get_mut(id) {
                object.data = data;
                object.modified_at = now;
                return Ok(());
            }
        }
        let Some(mut object) = self.object(id)? else {
            return Err(StoreError::NotFound(*id));
        };
        object.data = data;
        object.modified_at = now;
        self.pending.lock().unwrap().updated.insert(*id, object);
        Ok(())
    }

    /// Stages a deletion. A staged-but-unsaved insert simply vanishes.
    pub fn delete(&self, id: &ObjectId) {
        let mut pending = self.pending.lock().unwrap();
        if pending.inserted.remove(id).is_some() {
            return;
        }
        pending.updated.remove(id);
        pending.deleted.insert(*id);
    }

    /// Whether the context has staged, unsaved edits.
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.lock().unwrap().is_empty()
    }

    /// Identifiers currently materialized in this context.
    pub fn registered_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.registered.lock().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Commits staged edits in one store transaction.
    ///
    /// Returns the change record describing the save and hands it to every
    /// registered save observer. An empty save returns an empty record and
    /// notifies nobody.
    pub fn save(&self) -> StoreResult<ChangeRecord> {
        let record = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                return Ok(ChangeRecord::new());
            }

            let record = ChangeRecord::new()
                .with_inserted(pending.inserted.keys().copied())
                .with_updated(pending.updated.keys().copied())
                .with_deleted(pending.deleted.iter().copied());

            let upserts: Vec<StoredObject> = pending
                .inserted
                .values()
                .chain(pending.updated.values())
                .cloned()
                .collect();
            let deletes: Vec<ObjectId> = pending.deleted.iter().copied().collect();

            self.store.commit(&upserts, &deletes)?;

            let mut registered = self.registered.lock().unwrap();
            for object in upserts {
                registered.insert(object.id, object);
            }
            for id in &deletes {
                registered.remove(id);
            }
            *pending = PendingChanges::default();
            record
        };

        debug!("context {} saved {} changes", self.label, record.len());
        let observers = self.save_observers.lock().unwrap().clone();
        for observer in &observers {
            observer(&record);
        }
        Ok(record)
    }

    // ── Remote merge ─────────────────────────────────────────────

    /// Merges a remote change record into this context's registered cache.
    ///
    /// Deleted identifiers evict the cache entry; inserted identifiers are
    /// faulted in from the shared store; updated identifiers refresh only
    /// objects this context had already materialized. Identifiers that
    /// resolve to nothing are skipped silently — the remote object graph and
    /// the local one are only loosely synchronized. Applying the same record
    /// twice leaves the context in the same state as applying it once.
    pub fn merge_remote(&self, record: &ChangeRecord) -> StoreResult<()> {
        if record.is_empty() {
            return Ok(());
        }

        for id in &record.deleted {
            if self.registered.lock().unwrap().remove(id).is_some() {
                debug!("context {}: evicted deleted object {id}", self.label);
            }
        }

        for id in &record.inserted {
            match self.store.get_object(id)? {
                Some(object) => {
                    self.registered.lock().unwrap().insert(*id, object);
                }
                None => debug!("context {}: skipping unknown inserted object {id}", self.label),
            }
        }

        for id in &record.updated {
            if !self.registered.lock().unwrap().contains_key(id) {
                continue; // never faulted here
            }
            match self.store.get_object(id)? {
                Some(object) => {
                    self.registered.lock().unwrap().insert(*id, object);
                }
                None => {
                    // Row vanished under us; drop the stale cache entry.
                    self.registered.lock().unwrap().remove(id);
                }
            }
        }

        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
