//! Error types for opening databases.

use dbprobe_channel::ChannelError;
use dbprobe_store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`ProbeResult::open`](crate::ProbeResult::open) and
/// friends. Probing itself never fails.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The embedded engine failed to open or run a statement.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A background context could not be reached.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The hosting context reported a failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// The operation is not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
