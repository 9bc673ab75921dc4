// File-backed store
// Keeps entries in memory and rewrites the whole TOML file on every put

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{KvStore, StoreError};
use crate::logger;

/// Durable store persisted to a single TOML file
#[derive(Debug)]
pub struct FileStore {
    /// Path to the store file
    path: PathBuf,
    /// Current entries (cached in memory)
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty store. A file that exists but cannot be
    /// read or parsed is an error; it is never silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = Self::load(&path)?;
        logger::write_info(&format!(
            "[Store] Opened {} ({} entries)",
            path.display(),
            entries.len()
        ));
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `entries` to a temporary file, then rename it over the store file
    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| self.io_error(source))?;
            }
        }

        let tmp_path = self.tmp_path();
        write_synced(&tmp_path, content.as_bytes())
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Write `content` to `path` and flush it to disk before returning
async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        // Hold the write lock across the save so file writes are serialized
        let mut entries = self.entries.write().await;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value);
        self.save(&updated).await?;
        *entries = updated;
        Ok(())
    }
}
