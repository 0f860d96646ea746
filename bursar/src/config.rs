use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use bursar_core::{error::StorageError, storage::StorageEngine};
use bursar_remote::RemoteAccount;
use bursar_storage_json::JsonStorageEngine;
use bursar_storage_memory::MemoryStorageEngine;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Library configuration. Every field has a default, so an empty file (or no
/// file at all) yields the json backend rooted at `store/` and no remote
/// account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self { Self { backend: StorageBackend::Json, path: PathBuf::from("store") } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Json,
}

/// Credentials of the remote account transfers default to when the caller
/// does not supply one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub user_id: Option<String>,
    pub api_token: Option<String>,
}

impl RemoteConfig {
    pub fn account(&self) -> Option<RemoteAccount> {
        match (&self.user_id, &self.api_token) {
            (Some(user_id), Some(api_token)) => Some(RemoteAccount::new(user_id, api_token)),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        info!("loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// The storage engine this config selects.
    pub fn build_engine(&self) -> Result<Arc<dyn StorageEngine>, StorageError> {
        Ok(match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorageEngine::new()),
            StorageBackend::Json => Arc::new(JsonStorageEngine::with_path(&self.storage.path)?),
        })
    }
}
