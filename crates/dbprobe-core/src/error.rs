//! Error types for dbprobe core.

use thiserror::Error;

/// Errors raised while encoding or decoding boundary messages.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}
