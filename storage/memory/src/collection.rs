use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use bursar_core::{error::StorageError, storage::StorageCollection};

pub struct MemoryCollection {
    name: String,
    documents: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), documents: Mutex::new(BTreeMap::new()) } }
}

#[async_trait]
impl StorageCollection for MemoryCollection {
    async fn set(&self, id: &str, document: serde_json::Value) -> Result<bool, StorageError> {
        Ok(self.documents.lock().unwrap().insert(id.to_string(), document).is_some())
    }

    async fn get(&self, id: &str) -> Result<serde_json::Value, StorageError> {
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { collection: self.name.clone(), id: id.to_string() })
    }

    async fn remove(&self, id: &str) -> Result<bool, StorageError> { Ok(self.documents.lock().unwrap().remove(id).is_some()) }

    async fn list(&self) -> Result<Vec<serde_json::Value>, StorageError> { Ok(self.documents.lock().unwrap().values().cloned().collect()) }
}
