//! Manager configuration.

use std::path::PathBuf;

/// Configuration for a [`StoreManager`](crate::StoreManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Container name; namespaces the default store location.
    pub container_name: String,
    /// Explicit store file location. When unset the store lives in a
    /// per-container directory under the platform data directory.
    pub store_path: Option<PathBuf>,
    /// Model version this build writes into fresh stores and requires of
    /// existing ones on open.
    pub model_version: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            container_name: "hivestore".to_string(),
            store_path: None,
            model_version: "v1".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Resolves the store file location.
    pub fn store_path(&self) -> PathBuf {
        if let Some(path) = &self.store_path {
            return path.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(&self.container_name)
            .join("hivestore.sqlite3")
    }
}
