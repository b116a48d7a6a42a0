//! # dbprobe core
//!
//! Pure data for dbprobe: storage backends, capability replies, and SQL
//! values.
//!
//! This crate contains no I/O and no async code. Everything here can be
//! constructed, compared, and encoded without a runtime.
//!
//! ## Key Types
//!
//! - [`StorageBackend`] - A persistence strategy, strongest first
//! - [`DatabaseLocation`] / [`ExistingDatabase`] - Identity of a discovered database
//! - [`MissingFeature`] - Diagnostic flags gathered while probing
//! - [`CompatibilityReply`] - What a background context reports back
//! - [`SqlValue`] / [`QueryResult`] - Executor inputs and outputs
//!
//! ## Encoding
//!
//! Replies travel as CBOR payloads. See the [`codec`] module.

pub mod codec;
pub mod compat;
pub mod error;
pub mod sql;
pub mod types;

pub use codec::{decode_reply, encode_reply};
pub use compat::{
    CompatibilityCheck, CompatibilityReply, CompatibilityReport, DedicatedCompatibility,
    SharedCompatibility, WorkerError, DEFAULT_NAME_HINT,
};
pub use error::CodecError;
pub use sql::{QueryResult, SqlValue};
pub use types::{DatabaseLocation, ExistingDatabase, Hosting, MissingFeature, StorageBackend};
