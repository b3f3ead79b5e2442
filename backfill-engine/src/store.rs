//! Backfill snapshot persistence
//!
//! A driver checkpoints the snapshot after every iteration so a backfill can
//! resume after a restart.

use crate::backfill_data::AssetBackfillData;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Storage for backfill snapshots, keyed by backfill id
#[async_trait]
pub trait BackfillStore: Send + Sync {
    /// Save the latest snapshot, replacing any previous one
    async fn save(&self, backfill_id: &str, data: &AssetBackfillData) -> Result<()>;

    /// Load the latest snapshot
    async fn load(&self, backfill_id: &str) -> Result<Option<AssetBackfillData>>;

    /// Ids of every stored backfill, sorted
    async fn list(&self) -> Result<Vec<String>>;

    /// Remove a snapshot, returning whether one existed
    async fn delete(&self, backfill_id: &str) -> Result<bool>;
}

// --- In memory storage, useful for tests and one-shot runs

#[derive(Debug, Default)]
pub struct InMemoryBackfillStore {
    snapshots: RwLock<HashMap<String, AssetBackfillData>>,
}

impl InMemoryBackfillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackfillStore for InMemoryBackfillStore {
    async fn save(&self, backfill_id: &str, data: &AssetBackfillData) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(backfill_id.to_string(), data.clone());
        Ok(())
    }

    async fn load(&self, backfill_id: &str) -> Result<Option<AssetBackfillData>> {
        Ok(self.snapshots.read().await.get(backfill_id).cloned())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, backfill_id: &str) -> Result<bool> {
        Ok(self.snapshots.write().await.remove(backfill_id).is_some())
    }
}

// --- File based storage, one JSON document per backfill

#[derive(Debug, Clone)]
pub struct FileBackfillStore {
    root_path: PathBuf,
}

impl FileBackfillStore {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }

    /// Directory snapshots are written to
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn snapshot_path(&self, backfill_id: &str) -> Result<PathBuf> {
        validate_backfill_id(backfill_id)?;
        Ok(self.root_path.join(format!("{backfill_id}.json")))
    }
}

#[async_trait]
impl BackfillStore for FileBackfillStore {
    async fn save(&self, backfill_id: &str, data: &AssetBackfillData) -> Result<()> {
        let path = self.snapshot_path(backfill_id)?;
        let tmp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(data)?;

        tokio::fs::create_dir_all(&self.root_path)
            .await
            .map_err(storage_error)?;
        // Write then rename so readers never observe a partial snapshot
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(storage_error)?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(storage_error)?;

        debug!(path = %path.display(), "Saved backfill snapshot");
        Ok(())
    }

    async fn load(&self, backfill_id: &str) -> Result<Option<AssetBackfillData>> {
        let path = self.snapshot_path(backfill_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(storage_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, backfill_id: &str) -> Result<bool> {
        let path = self.snapshot_path(backfill_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn storage_error(err: io::Error) -> Error {
    Error::Storage(err.to_string())
}

/// Backfill ids become file names, so only a conservative character set is allowed
fn validate_backfill_id(backfill_id: &str) -> Result<()> {
    let valid = !backfill_id.is_empty()
        && backfill_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("invalid backfill id: {backfill_id:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::{AssetPartition, AssetPartitionSubset};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> AssetBackfillData {
        let target: AssetPartitionSubset = [
            AssetPartition::unpartitioned("root"),
            AssetPartition::partitioned("daily", "2023-01-01"),
        ]
        .into_iter()
        .collect();
        AssetBackfillData::empty(target, Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryBackfillStore::new();
        assert!(store.load("bf-1").await.unwrap().is_none());

        store.save("bf-1", &snapshot()).await.unwrap();
        assert_eq!(store.load("bf-1").await.unwrap(), Some(snapshot()));
        assert_eq!(store.list().await.unwrap(), vec!["bf-1".to_string()]);
        assert!(store.delete("bf-1").await.unwrap());
        assert!(!store.delete("bf-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackfillStore::new(dir.path().join("state"));

        assert!(store.list().await.unwrap().is_empty());
        store.save("bf-1", &snapshot()).await.unwrap();
        store.save("bf-1", &snapshot()).await.unwrap();

        assert_eq!(store.load("bf-1").await.unwrap(), Some(snapshot()));
        assert_eq!(store.list().await.unwrap(), vec!["bf-1".to_string()]);
        assert!(store.load("bf-2").await.unwrap().is_none());
        assert!(store.delete("bf-1").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBackfillStore::new(dir.path());

        let err = store.save("../escape", &snapshot()).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
