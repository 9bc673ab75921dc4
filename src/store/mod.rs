//! Key-value store module
//!
//! The service persists exactly one entry: the secrets blob under [`SECRETS_KEY`].
//! Backends only need `get` and `put`; the stored value is opaque text.

mod file;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key under which the whole secrets blob is stored
pub const SECRETS_KEY: &str = "mcp-secrets-v1";

/// Store backend failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse store file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize store contents: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Asynchronous string key-value store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value stored under `key`
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Store handle shared by every request
pub type SharedStore = Arc<dyn KvStore>;

/// Open the backend selected in configuration
pub fn open_store(config: &StoreConfig) -> Result<SharedStore, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => Ok(Arc::new(FileStore::open(&config.path)?)),
    }
}
