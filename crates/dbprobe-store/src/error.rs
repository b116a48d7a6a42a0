//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur while hosting a database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error while materializing a database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding shared state was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// The initializer supplied by the caller failed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A remote executor reported a failure.
    #[error("remote executor error: {0}")]
    Remote(String),

    /// The database was already closed.
    #[error("database is closed")]
    Closed,
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
