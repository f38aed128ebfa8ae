//! Checkpoint persistence.
//!
//! The file store keeps one JSON document at `.last_update` and replaces it
//! atomically. Older deployments wrote a bare ISO-8601 timestamp to the same
//! file; that form is still read.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, CheckpointState};
use crate::storage::CheckpointStore;

/// Checkpoint kept in a small file on local disk.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, text: &str) -> Result<CheckpointState> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed).map_err(|e| {
                AppError::checkpoint(format!("{}: {}", self.path.display(), e))
            });
        }

        let watermark = Checkpoint::parse(trimmed).ok_or_else(|| {
            AppError::checkpoint(format!(
                "{}: unrecognised timestamp '{}'",
                self.path.display(),
                trimmed
            ))
        })?;
        Ok(CheckpointState::new(watermark))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<CheckpointState>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        self.parse(&text).map(Some)
    }

    async fn save(&self, state: &CheckpointState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    state: Mutex<Option<CheckpointState>>,
    saves: Mutex<usize>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a watermark.
    pub fn with_watermark(watermark: Checkpoint) -> Self {
        Self {
            state: Mutex::new(Some(CheckpointState::new(watermark))),
            saves: Mutex::new(0),
        }
    }

    /// Current watermark, epoch when unset.
    pub fn watermark(&self) -> Checkpoint {
        self.state
            .lock()
            .map(|state| state.as_ref().map(|s| s.watermark).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<CheckpointState>> {
        self.state
            .lock()
            .map(|state| state.clone())
            .map_err(|_| AppError::checkpoint("checkpoint lock poisoned"))
    }

    async fn save(&self, state: &CheckpointState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::checkpoint("checkpoint lock poisoned"))?;
        *guard = Some(state.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_epoch() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(tmp.path().join(".last_update"));

        assert!(store.load().await.unwrap().is_none());
        assert!(store.load_watermark().await.unwrap().is_epoch());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(tmp.path().join("state").join(".last_update"));

        let mut state = CheckpointState::new(Checkpoint::parse("2024-06-01T08:00:00Z").unwrap());
        state.shard = Some("verdragenbank_shard_20240601T080000Z_000.jsonl".into());
        state.records = 12;
        store.save(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(state.clone()));
        assert!(!store.path().with_extension("tmp").exists());

        // Last write wins
        let newer = CheckpointState::new(Checkpoint::parse("2024-07-01").unwrap());
        store.save(&newer).await.unwrap();
        assert_eq!(store.load_watermark().await.unwrap(), newer.watermark);
    }

    #[tokio::test]
    async fn test_reads_legacy_timestamp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".last_update");
        tokio::fs::write(&path, "2025-01-31T10:15:00.123456+00:00\n")
            .await
            .unwrap();

        let store = FileCheckpointStore::new(&path);
        let watermark = store.load_watermark().await.unwrap();
        assert_eq!(watermark.to_rfc3339(), "2025-01-31T10:15:00Z");
    }

    #[tokio::test]
    async fn test_garbage_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".last_update");
        tokio::fs::write(&path, "not a date").await.unwrap();

        let err = FileCheckpointStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AppError::Checkpoint(_)));
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = MemoryCheckpointStore::with_watermark(Checkpoint::parse("2024-01-01").unwrap());
        assert_eq!(store.watermark(), Checkpoint::parse("2024-01-01").unwrap());

        store
            .save(&CheckpointState::new(Checkpoint::parse("2024-02-01").unwrap()))
            .await
            .unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.watermark(), Checkpoint::parse("2024-02-01").unwrap());
    }
}
