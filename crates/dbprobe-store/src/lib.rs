//! # dbprobe store
//!
//! Hosting for the embedded SQL engine. Provides the [`Executor`] trait every
//! connection talks to, the [`VirtualFileSystem`] a database file lives in,
//! and [`LocalDatabase`], which runs SQLite in the current context.
//!
//! ## Key Types
//!
//! - [`Executor`] - Runs SQL against one open database
//! - [`KeyValueStore`] - Durable key/value storage of opaque bytes
//! - [`VirtualFileSystem`] - Whole-file storage the engine reads and writes
//! - [`MemoryFileSystem`] - Non-durable file system for the in-memory backend
//! - [`KeyValueFileSystem`] - File system layered over a [`KeyValueStore`]
//! - [`LocalDatabase`] - SQLite hosted in this context
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbprobe_store::{Executor, LocalDatabase, MemoryFileSystem, DATABASE_PATH};
//!
//! async fn example() {
//!     let fs = Arc::new(MemoryFileSystem::new());
//!     let db = LocalDatabase::open(fs, DATABASE_PATH, None).await.unwrap();
//!     db.execute_batch("CREATE TABLE notes (body TEXT)").await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Whole-file write-back**: committed state is copied into the virtual
//!   file system each time a write leaves autocommit mode
//! - **Lazy seeding**: [`initialize_if_missing`] only runs its initializer
//!   when the file is absent

pub mod error;
pub mod kv_fs;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use kv_fs::{database_names, KeyValueFileSystem};
pub use memory::{MemoryFileSystem, MemoryKeyValueStore};
pub use sqlite::{initialize_if_missing, LocalDatabase, LocalSetup};
pub use traits::{Executor, KeyValueStore, VirtualFileSystem, DATABASE_PATH};
