//! Store traits: the abstract interfaces for hosting a database.
//!
//! [`Executor`] is what a connection talks to, whether the database lives in
//! this context or behind a channel. [`KeyValueStore`] and
//! [`VirtualFileSystem`] describe where the database file lives.

use async_trait::async_trait;
use bytes::Bytes;

use dbprobe_core::{QueryResult, SqlValue};

use crate::error::Result;

/// Fixed path of the database file inside a virtual file system.
pub const DATABASE_PATH: &str = "/database";

/// Runs SQL against one open database.
///
/// Implementations must be usable from several tasks at once; statements are
/// serialized internally.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a single statement, returning the number of rows changed.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run several `;`-separated statements without parameters.
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a query and collect all rows.
    async fn select(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Release the database. Further calls fail with
    /// [`StoreError::Closed`](crate::StoreError::Closed).
    async fn close(&self) -> Result<()>;
}

/// A durable key/value store holding opaque byte values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// List every key, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// A whole-file virtual file system the engine reads and writes through.
#[async_trait]
pub trait VirtualFileSystem: Send + Sync {
    /// Whether a file exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read a whole file.
    async fn read(&self, path: &str) -> Result<Option<Bytes>>;

    /// Create or replace a whole file.
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;
}
