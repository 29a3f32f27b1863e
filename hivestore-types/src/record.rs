//! Change records: the unit of inter-process change propagation.
//!
//! A record describes the outcome of one save as identifier sets grouped by
//! operation kind. Identifiers are the only payload — no field-level data
//! crosses the process boundary.

use crate::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Object identifiers grouped by the kind of change they underwent.
///
/// Produced by a successful save, consumed by the merge step on the
/// receiving side. Sets are ordered so the serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Objects created by the save.
    #[serde(default)]
    pub inserted: BTreeSet<ObjectId>,
    /// Objects whose payload was modified.
    #[serde(default)]
    pub updated: BTreeSet<ObjectId>,
    /// Objects removed from the store.
    #[serde(default)]
    pub deleted: BTreeSet<ObjectId>,
}

impl ChangeRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds inserted identifiers.
    #[must_use]
    pub fn with_inserted(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.inserted.extend(ids);
        self
    }

    /// Adds updated identifiers.
    #[must_use]
    pub fn with_updated(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.updated.extend(ids);
        self
    }

    /// Adds deleted identifiers.
    #[must_use]
    pub fn with_deleted(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.deleted.extend(ids);
        self
    }

    /// Whether the record carries no identifiers at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of identifiers across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Folds another record into this one (set union per kind).
    pub fn merge(&mut self, other: &ChangeRecord) {
        self.inserted.extend(other.inserted.iter().copied());
        self.updated.extend(other.updated.iter().copied());
        self.deleted.extend(other.deleted.iter().copied());
    }
}
