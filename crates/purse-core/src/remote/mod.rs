//! Remote document stores
//!
//! The remote side is an opaque key-value document API: one JSON document per
//! key inside a named collection, replaced wholesale on every upsert.

mod file;
mod http;
mod memory;

use std::future::Future;

use serde_json::Value;

use crate::error::Result;

pub use file::FileBackupStore;
pub use http::HttpBackupStore;
pub use memory::MemoryBackupStore;

/// Collection holding one backup envelope per user
pub const BACKUP_COLLECTION: &str = "user_backups";

/// Single-document-per-key remote storage.
pub trait RemoteBackupStore: Send + Sync {
    /// Insert or fully replace the document stored under `key`
    fn upsert_document(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the document stored under `key`, `None` when absent
    fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Check whether a document exists under `key`
    fn document_exists(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}
