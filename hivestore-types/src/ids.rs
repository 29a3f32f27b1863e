//! Object identifiers and their external URI form.
//!
//! Uses UUID v7 for time-ordered, globally unique identifiers. Identifiers
//! cross the process boundary as URIs in a custom scheme so they cannot be
//! confused with arbitrary URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// URI scheme for externally visible object identifiers.
pub const OBJECT_URI_SCHEME: &str = "hive-object";

/// Stable identifier for an object in the store.
/// Uses UUID v7 which embeds a timestamp for natural ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Creates a new object ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an object ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an object ID from a bare UUID string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the external URI form, e.g. `hive-object://<uuid>`.
    #[must_use]
    pub fn to_uri(&self) -> String {
        format!("{OBJECT_URI_SCHEME}://{}", self.0)
    }

    /// Resolves an external URI back to an identifier.
    ///
    /// Returns `None` for any string outside the `hive-object` scheme or
    /// whose remainder is not a valid UUID.
    #[must_use]
    pub fn resolve_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(OBJECT_URI_SCHEME)?.strip_prefix("://")?;
        Uuid::parse_str(rest).ok().map(Self)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
