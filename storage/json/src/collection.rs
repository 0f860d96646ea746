use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use bursar_core::{error::StorageError, storage::StorageCollection};

pub struct JsonCollection {
    name: String,
    path: PathBuf,
    documents: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl JsonCollection {
    pub(crate) fn open(name: &str, root: &Path) -> Result<Self, StorageError> {
        let path = root.join(format!("{name}.json"));
        let documents = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { name: name.to_string(), path, documents: Mutex::new(documents) })
    }

    /// Writes go to a sibling temp file first; the rename is the commit.
    fn flush(&self, documents: &BTreeMap<String, serde_json::Value>) -> Result<(), StorageError> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(documents)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl StorageCollection for JsonCollection {
    async fn set(&self, id: &str, document: serde_json::Value) -> Result<bool, StorageError> {
        let mut documents = self.documents.lock().unwrap();
        let existed = documents.insert(id.to_string(), document).is_some();
        self.flush(&documents)?;
        Ok(existed)
    }

    async fn get(&self, id: &str) -> Result<serde_json::Value, StorageError> {
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { collection: self.name.clone(), id: id.to_string() })
    }

    async fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut documents = self.documents.lock().unwrap();
        let existed = documents.remove(id).is_some();
        if existed {
            self.flush(&documents)?;
        }
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<serde_json::Value>, StorageError> { Ok(self.documents.lock().unwrap().values().cloned().collect()) }
}
