//! Directory-backed remote store.
//!
//! Layout: `<root>/<collection>/<key>.json`, with collection and key
//! percent-encoded so arbitrary user ids cannot escape the root.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use super::RemoteBackupStore;
use crate::error::{Error, Result};

/// Document store persisted as JSON files under a root directory.
///
/// Useful as a sync-folder target or for local testing of the full backup
/// path without a network service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBackupStore {
    root: PathBuf,
}

impl FileBackupStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: &str, key: &str) -> Result<PathBuf> {
        let collection = encode_segment(collection, "collection")?;
        let key = encode_segment(key, "key")?;
        Ok(self.root.join(collection).join(format!("{key}.json")))
    }
}

fn encode_segment(raw: &str, field: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!(
            "document {field} must not be empty"
        )));
    }
    // `.` is left alone by percent-encoding; keep "." and ".." out of paths
    Ok(urlencoding::encode(trimmed).replace('.', "%2E"))
}

impl RemoteBackupStore for FileBackupStore {
    async fn upsert_document(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        let path = self.document_path(collection, key)?;
        let dir = path.parent().map_or_else(|| self.root.clone(), Path::to_path_buf);
        tokio::fs::create_dir_all(&dir).await?;

        let serialized = serde_json::to_vec_pretty(value)?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            // Each writer gets its own temp file; the rename decides the winner.
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(&serialized)?;
            temp.as_file().sync_all()?;
            temp.persist(&target)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Remote(format!("document write task failed: {e}")))??;

        tracing::debug!("Wrote remote document {}", path.display());
        Ok(())
    }

    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let path = self.document_path(collection, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn document_exists(&self, collection: &str, key: &str) -> Result<bool> {
        let path = self.document_path(collection, key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_then_get_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = FileBackupStore::new(tmp.path());

        let doc = json!({"userId": "user@example.com", "payload": {"x": 1}});
        store
            .upsert_document("user_backups", "user@example.com", &doc)
            .await
            .unwrap();

        assert!(store
            .document_exists("user_backups", "user@example.com")
            .await
            .unwrap());
        let loaded = store
            .get_document("user_backups", "user@example.com")
            .await
            .unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let tmp = tempdir().unwrap();
        let store = FileBackupStore::new(tmp.path());

        assert!(store.get_document("user_backups", "nobody").await.unwrap().is_none());
        assert!(!store.document_exists("user_backups", "nobody").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_stay_inside_root() {
        let tmp = tempdir().unwrap();
        let store = FileBackupStore::new(tmp.path());

        let path = store.document_path("user_backups", "../../etc/passwd").unwrap();
        assert!(path.starts_with(tmp.path().join("user_backups")));
        assert_eq!(path.parent(), Some(tmp.path().join("user_backups").as_path()));

        let dots = store.document_path("user_backups", "..").unwrap();
        assert_eq!(dots.parent(), Some(tmp.path().join("user_backups").as_path()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_leave_one_complete_document() {
        let tmp = tempdir().unwrap();
        let store = FileBackupStore::new(tmp.path());

        for round in 0..10 {
            let writers: Vec<_> = (0..4_usize)
                .map(|writer| {
                    let store = store.clone();
                    let doc = json!({
                        "round": round,
                        "writer": writer,
                        "padding": "x".repeat(6400 * (writer + 1)),
                    });
                    tokio::spawn(async move {
                        store.upsert_document("user_backups", "u1", &doc).await
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let loaded = store
                .get_document("user_backups", "u1")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(loaded["round"], round);
        }

        let files = std::fs::read_dir(tmp.path().join("user_backups"))
            .unwrap()
            .count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let tmp = tempdir().unwrap();
        let store = FileBackupStore::new(tmp.path());

        let result = store.upsert_document("user_backups", "  ", &json!({})).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
