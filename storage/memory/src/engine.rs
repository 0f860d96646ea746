use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bursar_core::{
    error::StorageError,
    storage::{StorageCollection, StorageEngine},
};

use crate::collection::MemoryCollection;

/// Storage engine that keeps every collection in process memory. Nothing
/// survives a restart; intended for tests and ephemeral deployments.
pub struct MemoryStorageEngine {
    collections: Mutex<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStorageEngine {
    pub fn new() -> Self { Self { collections: Mutex::new(BTreeMap::new()) } }
}

impl Default for MemoryStorageEngine {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl StorageEngine for MemoryStorageEngine {
    async fn collection(&self, name: &str) -> Result<Arc<dyn StorageCollection>, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(name.to_string()).or_insert_with(|| Arc::new(MemoryCollection::new(name))).clone();
        Ok(collection)
    }

    async fn delete_all_collections(&self) -> Result<bool, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        let any_deleted = !collections.is_empty();
        collections.clear();
        Ok(any_deleted)
    }
}
