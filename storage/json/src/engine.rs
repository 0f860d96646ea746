use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bursar_core::{
    error::StorageError,
    storage::{StorageCollection, StorageEngine},
};
use tracing::debug;

use crate::collection::JsonCollection;

/// Storage engine that keeps each collection in one JSON file under a root
/// directory. Collections are loaded on first open and written back whole on
/// every mutation.
pub struct JsonStorageEngine {
    root: PathBuf,
    collections: Mutex<BTreeMap<String, Arc<JsonCollection>>>,
}

impl JsonStorageEngine {
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = path.into();
        std::fs::create_dir_all(&root)?;
        debug!("json storage rooted at {}", root.display());
        Ok(Self { root, collections: Mutex::new(BTreeMap::new()) })
    }

    pub fn root(&self) -> &PathBuf { &self.root }
}

#[async_trait]
impl StorageEngine for JsonStorageEngine {
    async fn collection(&self, name: &str) -> Result<Arc<dyn StorageCollection>, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(collection) = collections.get(name) {
            return Ok(collection.clone());
        }
        let collection = Arc::new(JsonCollection::open(name, &self.root)?);
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    async fn delete_all_collections(&self) -> Result<bool, StorageError> {
        let mut collections = self.collections.lock().unwrap();
        collections.clear();

        let mut any_deleted = false;
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)?;
                any_deleted = true;
            }
        }
        Ok(any_deleted)
    }
}
