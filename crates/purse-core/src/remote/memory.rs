//! In-process remote store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::RemoteBackupStore;
use crate::error::Result;

/// Document store held in memory; clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackupStore {
    documents: Arc<Mutex<HashMap<(String, String), Value>>>,
}

impl MemoryBackupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all collections
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    /// Whether no documents are stored
    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

impl RemoteBackupStore for MemoryBackupStore {
    async fn upsert_document(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        self.documents
            .lock()
            .await
            .insert((collection.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .lock()
            .await
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    async fn document_exists(&self, collection: &str, key: &str) -> Result<bool> {
        Ok(self
            .documents
            .lock()
            .await
            .contains_key(&(collection.to_string(), key.to_string())))
    }
}
