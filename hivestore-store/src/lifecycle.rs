//! Store-loading state machine.
//!
//! Orchestrates the version gate and the clear/retry recovery sequence
//! around the underlying open attempt. At most two load attempts ever
//! occur, and the caller's future resolves exactly once with either the
//! opened store or the terminating error.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::version::version_satisfied;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Policy governing whether an incompatible or unopenable store may be
/// destroyed and recreated during load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Never clear; version mismatches and open failures are terminal.
    Never,
    /// Clear unconditionally before the load attempt.
    Always,
    /// Clear only when the version gate fails or the first open attempt
    /// fails, then retry exactly once.
    IfMigrationFails,
}

/// Outcome details of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Whether the store was destroyed and recreated on the way to success.
    pub cleared: bool,
}

/// Opens the store according to the recovery policy.
pub struct StoreLifecycle {
    path: PathBuf,
    model_version: String,
}

impl StoreLifecycle {
    /// Creates a lifecycle for the store at `path`, writing and requiring
    /// `model_version` on open.
    pub fn new(path: impl Into<PathBuf>, model_version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            model_version: model_version.into(),
        }
    }

    /// The store path this lifecycle manages.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the store asynchronously.
    ///
    /// Runs the blocking open/clear sequence on a blocking task and resolves
    /// exactly once. `required_version` feeds the version gate; `policy`
    /// selects the recovery path when the gate or the open attempt fails.
    pub async fn load(
        &self,
        required_version: Option<String>,
        policy: ClearPolicy,
    ) -> StoreResult<(Store, LoadReport)> {
        let path = self.path.clone();
        let model_version = self.model_version.clone();
        tokio::task::spawn_blocking(move || {
            load_blocking(&path, &model_version, required_version.as_deref(), policy)
        })
        .await
        .map_err(|e| StoreError::OpenFailed(format!("load task failed: {e}")))?
    }
}

fn load_blocking(
    path: &Path,
    model_version: &str,
    required_version: Option<&str>,
    policy: ClearPolicy,
) -> StoreResult<(Store, LoadReport)> {
    let satisfied = version_satisfied(required_version, path);
    debug!(
        "loading store at {} (policy {policy:?}, version satisfied: {satisfied})",
        path.display()
    );

    match (policy, satisfied) {
        (ClearPolicy::Never, false) => {
            // The gate failed and recovery is forbidden: no load attempt,
            // store left untouched.
            Err(StoreError::VersionMismatch(
                required_version.unwrap_or_default().to_string(),
            ))
        }
        (ClearPolicy::Always, _) => {
            clear_store(path);
            let store = Store::open(path, model_version)?;
            info!("store loaded after unconditional clear");
            Ok((store, LoadReport { cleared: true }))
        }
        (ClearPolicy::IfMigrationFails, false) => {
            clear_store(path);
            let store = Store::open(path, model_version)?;
            info!("store loaded after clearing incompatible data");
            Ok((store, LoadReport { cleared: true }))
        }
        _ => match Store::open(path, model_version) {
            Ok(store) => Ok((store, LoadReport { cleared: false })),
            Err(first) if policy == ClearPolicy::IfMigrationFails => {
                warn!("initial load failed ({first}); clearing store and retrying once");
                clear_store(path);
                let store = Store::open(path, model_version)?;
                info!("store loaded on retry after clear");
                Ok((store, LoadReport { cleared: true }))
            }
            Err(e) => Err(e),
        },
    }
}

/// Clearing is best-effort: a failed destroy is logged and the subsequent
/// open attempt proceeds against whatever remains.
fn clear_store(path: &Path) {
    if let Err(e) = Store::destroy(path) {
        warn!("store clear failed, proceeding anyway: {e}");
    }
}
