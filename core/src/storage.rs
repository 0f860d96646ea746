use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;

/// A document store. Engines are dumb: they persist and retrieve JSON
/// documents by collection and id, and know nothing about the ledger or the
/// domain models serialized into them.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Opens and/or creates a storage collection.
    async fn collection(&self, name: &str) -> Result<Arc<dyn StorageCollection>, StorageError>;

    /// Delete all collections and their data from the storage engine.
    async fn delete_all_collections(&self) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait StorageCollection: Send + Sync {
    /// Insert or replace a document. Returns true if a document with this id
    /// already existed.
    async fn set(&self, id: &str, document: serde_json::Value) -> Result<bool, StorageError>;

    async fn get(&self, id: &str) -> Result<serde_json::Value, StorageError>;

    /// Remove a document. Returns true if it existed.
    async fn remove(&self, id: &str) -> Result<bool, StorageError>;

    /// Every document in the collection, in unspecified order.
    async fn list(&self) -> Result<Vec<serde_json::Value>, StorageError>;

    async fn set_all(&self, documents: Vec<(String, serde_json::Value)>) -> Result<(), StorageError> {
        for (id, document) in documents {
            self.set(&id, document).await?;
        }
        Ok(())
    }
}

/// Handle to a collection without any knowledge of the model type.
#[derive(Clone)]
pub struct StorageCollectionWrapper(pub(crate) Arc<dyn StorageCollection>);

impl StorageCollectionWrapper {
    pub fn new(bucket: Arc<dyn StorageCollection>) -> Self { Self(bucket) }
}

impl std::ops::Deref for StorageCollectionWrapper {
    type Target = Arc<dyn StorageCollection>;
    fn deref(&self) -> &Self::Target { &self.0 }
}
