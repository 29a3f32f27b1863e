//! Model-version gate.
//!
//! Decides whether an existing store satisfies a caller-supplied required
//! version, from metadata alone. Pure read: the store is never opened
//! read-write and never mutated.

use crate::store::Store;
use std::path::Path;
use tracing::debug;

/// Returns whether the store at `path` satisfies `required`.
///
/// With no required identifier the gate is always satisfied. Otherwise the
/// store's metadata must be readable and its version-identifier set must
/// contain the required identifier; a missing or corrupt store is not
/// satisfied.
pub fn version_satisfied(required: Option<&str>, path: &Path) -> bool {
    let Some(required) = required else {
        return true;
    };
    match Store::read_metadata(path) {
        Ok(meta) => meta.version_identifiers.contains(required),
        Err(e) => {
            debug!(
                "version gate: metadata unavailable at {}: {e}",
                path.display()
            );
            false
        }
    }
}
