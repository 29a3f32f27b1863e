//! Registry of live working contexts.
//!
//! Tracks the primary context (always live) plus any number of secondary
//! contexts through non-owning references, so a secondary context that the
//! caller drops disappears from future snapshots without an explicit
//! unregister. The registry must never extend a secondary context's
//! lifetime.

use hivestore_store::WorkingContext;
use std::sync::{Arc, Mutex, Weak};

/// Tracks the set of currently-live working contexts.
#[derive(Default)]
pub struct ContextRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    primary: Option<Arc<WorkingContext>>,
    secondaries: Vec<Weak<WorkingContext>>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the primary context. The primary is held strongly and
    /// appears in every snapshot.
    pub fn set_primary(&self, context: Arc<WorkingContext>) {
        self.inner.lock().unwrap().primary = Some(context);
    }

    /// The primary context, if one has been installed.
    pub fn primary(&self) -> Option<Arc<WorkingContext>> {
        self.inner.lock().unwrap().primary.clone()
    }

    /// Registers a secondary context. Only a weak reference is kept.
    pub fn register(&self, context: &Arc<WorkingContext>) {
        let mut inner = self.inner.lock().unwrap();
        inner.secondaries.retain(|weak| weak.strong_count() > 0);
        inner.secondaries.push(Arc::downgrade(context));
    }

    /// Returns the primary plus every still-reachable secondary context.
    /// Dead references are pruned as a side effect.
    pub fn snapshot(&self) -> Vec<Arc<WorkingContext>> {
        let mut inner = self.inner.lock().unwrap();
        let mut live = Vec::with_capacity(1 + inner.secondaries.len());
        if let Some(primary) = &inner.primary {
            live.push(primary.clone());
        }
        inner.secondaries.retain(|weak| match weak.upgrade() {
            Some(context) => {
                live.push(context);
                true
            }
            None => false,
        });
        live
    }

    /// Number of secondary references still tracked (after pruning).
    pub fn tracked_secondaries(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.secondaries.retain(|weak| weak.strong_count() > 0);
        inner.secondaries.len()
    }
}
