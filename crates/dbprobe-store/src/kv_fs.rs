//! A virtual file system stored in a key/value store.
//!
//! Each database gets its own key namespace (its name), so several databases
//! can share one store. Files are stored whole under `"{namespace}{path}"`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::traits::{KeyValueStore, VirtualFileSystem, DATABASE_PATH};

/// File system backed by a [`KeyValueStore`].
pub struct KeyValueFileSystem {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl KeyValueFileSystem {
    /// Open the file system for database `name` on top of `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, name: &str) -> Self {
        Self {
            store,
            namespace: name.to_string(),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}{}", self.namespace, path)
    }
}

#[async_trait]
impl VirtualFileSystem for KeyValueFileSystem {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.store.get(&self.key(path)).await?.is_some())
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        self.store.get(&self.key(path)).await
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        self.store.put(&self.key(path), data).await
    }
}

/// Names of every database with a file at [`DATABASE_PATH`] in `store`.
pub async fn database_names(store: &dyn KeyValueStore) -> Result<Vec<String>> {
    let mut names: Vec<String> = store
        .keys()
        .await?
        .into_iter()
        .filter_map(|key| key.strip_suffix(DATABASE_PATH).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    Ok(names)
}
