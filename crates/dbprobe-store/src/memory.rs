//! In-memory implementations of the store traits.
//!
//! Nothing here survives the value being dropped. [`MemoryFileSystem`] backs
//! the in-memory backend; [`MemoryKeyValueStore`] stands in for a durable
//! key/value store wherever one is needed without a browser.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::{KeyValueStore, VirtualFileSystem};

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

/// Key/value store kept in a `HashMap`.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// File system whose files live only as long as the value.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryFileSystem {
    /// Create an empty file system.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VirtualFileSystem for MemoryFileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files.get(path).cloned())
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let mut files = self.files.write().map_err(poisoned)?;
        files.insert(path.to_string(), data);
        Ok(())
    }
}
