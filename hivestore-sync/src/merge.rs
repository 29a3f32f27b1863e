//! Applies change records to live working contexts.

use crate::registry::ContextRegistry;
use hivestore_store::WorkingContext;
use hivestore_types::ChangeRecord;
use std::sync::Arc;
use tracing::{debug, warn};

/// Merges change records into every live context that opts in.
///
/// A context participates only while its auto-merge flag is enabled.
/// Per-context store errors are logged and do not stop the remaining
/// contexts from receiving the record. Applying the same record twice is
/// harmless because the underlying context merge is idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeMergeEngine;

impl ChangeMergeEngine {
    /// Creates a merge engine.
    pub fn new() -> Self {
        Self
    }

    /// Applies `record` to the auto-merging subset of `contexts`.
    /// Returns the number of contexts the record was merged into.
    pub fn apply(&self, record: &ChangeRecord, contexts: &[Arc<WorkingContext>]) -> usize {
        if record.is_empty() {
            return 0;
        }
        let mut applied = 0;
        for context in contexts.iter().filter(|c| c.auto_merges_changes()) {
            match context.merge_remote(record) {
                Ok(()) => applied += 1,
                Err(e) => warn!("merge into context {} failed: {e}", context.label()),
            }
        }
        debug!("applied change record ({} ids) to {applied} contexts", record.len());
        applied
    }

    /// Convenience: applies `record` against a registry snapshot.
    pub fn apply_to_registry(&self, record: &ChangeRecord, registry: &ContextRegistry) -> usize {
        self.apply(record, &registry.snapshot())
    }
}
