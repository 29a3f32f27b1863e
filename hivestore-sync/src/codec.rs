//! Change-record wire codec.
//!
//! The channel treats serialized records as opaque blobs; the codec is the
//! pluggable seam that turns a record into bytes and back. The default
//! wire form is a JSON mapping of change-kind to a list of resolvable
//! object-identifier URIs.

use crate::error::{SyncError, SyncResult};
use hivestore_types::{ChangeRecord, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Encodes and decodes change records for the blackboard mailboxes.
pub trait ChangeCodec: Send + Sync {
    /// Serializes a record to an opaque blob.
    fn encode(&self, record: &ChangeRecord) -> SyncResult<Vec<u8>>;

    /// Deserializes a blob back into a record.
    fn decode(&self, bytes: &[u8]) -> SyncResult<ChangeRecord>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireRecord {
    #[serde(default)]
    inserted: Vec<String>,
    #[serde(default)]
    updated: Vec<String>,
    #[serde(default)]
    deleted: Vec<String>,
}

/// The default codec: change-kind → URI-list JSON.
///
/// Decoding resolves each URI; URIs outside the object scheme are skipped
/// silently, since the sender's object graph and ours are only loosely
/// synchronized. Malformed JSON is a [`SyncError::Deserialization`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChangeCodec;

impl ChangeCodec for JsonChangeCodec {
    fn encode(&self, record: &ChangeRecord) -> SyncResult<Vec<u8>> {
        let wire = WireRecord {
            inserted: record.inserted.iter().map(ObjectId::to_uri).collect(),
            updated: record.updated.iter().map(ObjectId::to_uri).collect(),
            deleted: record.deleted.iter().map(ObjectId::to_uri).collect(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn decode(&self, bytes: &[u8]) -> SyncResult<ChangeRecord> {
        let wire: WireRecord = serde_json::from_slice(bytes)
            .map_err(|e| SyncError::Deserialization(e.to_string()))?;
        Ok(ChangeRecord::new()
            .with_inserted(resolve_all(&wire.inserted))
            .with_updated(resolve_all(&wire.updated))
            .with_deleted(resolve_all(&wire.deleted)))
    }
}

fn resolve_all(uris: &[String]) -> impl Iterator<Item = ObjectId> + '_ {
    uris.iter().filter_map(|uri| {
        let id = ObjectId::resolve_uri(uri);
        if id.is_none() {
            debug!("skipping unresolvable identifier URI {uri:?}");
        }
        id
    })
}
