//! Error types for the channel module.

use thiserror::Error;

/// Errors that can occur while talking across a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The other end of the channel is gone.
    #[error("channel closed")]
    Closed,

    /// The caller side released the init channel without answering.
    #[error("initialization aborted by the caller")]
    InitAborted,

    /// A context refused or failed to accept a posted request.
    #[error("post failed: {0}")]
    PostFailed(String),

    /// Protocol version mismatch with the hosting side.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// The peer answered with a message that does not fit the exchange.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The hosting side reported a failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// Payload encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] dbprobe_core::CodecError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] dbprobe_store::StoreError),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
