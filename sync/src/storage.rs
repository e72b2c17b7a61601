//! Durable key-value storage for the outbox queue.
//!
//! The outbox only needs `get`/`set` on string values, so any backend that
//! can store a string under a key will do. Two backends ship here: an
//! in-memory map and a directory of files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, SyncError};

/// Key under which the outbox queue is persisted.
pub const QUEUE_KEY: &str = "@sync_queue";

/// Async string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one entry.
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.into(), value.into());
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key under a data directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "File store opened");
        Ok(Self { dir })
    }

    /// Directory holding the store's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if name.trim_matches('_').is_empty() {
            return Err(SyncError::Storage(format!("unusable key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
