//! # dbprobe
//!
//! Find the strongest storage backend an environment can host an embedded
//! SQLite database on, and open a connection to it.
//!
//! ## Overview
//!
//! Storage and concurrency primitives come and go between runtimes. dbprobe
//! asks up to two background contexts (a dedicated one and a shared one)
//! what they can reach, builds a catalog of viable backends from their
//! replies, and then hosts the database either in the context that owns the
//! chosen backend or, failing that, in the caller's own context.
//!
//! - **Probe**: [`probe`] never fails; anything that goes wrong becomes a
//!   [`MissingFeature`]
//! - **Catalog**: [`StorageBackend::InMemory`] is always viable
//! - **Open**: [`ProbeResult::open`] consumes the probe's contexts and returns
//!   one [`Connection`]
//! - **Seeding**: an optional [`Initializer`] runs at most once, and only if
//!   the database does not exist yet
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbprobe::{initializer, probe, Environment, ProbeConfig};
//!
//! async fn example(env: Arc<dyn Environment>) {
//!     let result = probe(env, ProbeConfig::default()).await;
//!     let backend = result.preferred_backend("notes");
//!
//!     let seed = initializer(|| async { Ok::<_, anyhow::Error>(None) });
//!     let conn = result.open(backend, "notes", Some(seed)).await.unwrap();
//!     conn.execute_batch("CREATE TABLE IF NOT EXISTS notes (body TEXT)")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `dbprobe::core` - Backends, compatibility messages, SQL values
//! - `dbprobe::store` - Executors, file systems, local hosting
//! - `dbprobe::channel` - Context traits, ports, and the query protocol

pub mod catalog;
pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod establish;
pub mod lifecycle;
pub mod probe;

// Re-export component crates
pub use dbprobe_channel as channel;
pub use dbprobe_core as core;
pub use dbprobe_store as store;

pub use catalog::{backends_from_dedicated, backends_from_shared, BackendCatalog};
pub use config::ProbeConfig;
pub use connection::{Connection, ConnectionId, UpdateEvent, UpdateHub, Updates};
pub use environment::Environment;
pub use error::{DatabaseError, Result};
pub use establish::{initializer, open_database, InitFuture, Initializer, OpenedDatabase};
pub use lifecycle::{ContextHandles, Host};
pub use probe::{probe, ProbeResult};

// Re-export commonly used core types
pub use dbprobe_core::{
    DatabaseLocation, ExistingDatabase, MissingFeature, QueryResult, SqlValue, StorageBackend,
};
