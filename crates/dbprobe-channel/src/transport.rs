//! Two-endpoint message channels.
//!
//! A [`Port`] is one end of a channel: it sends `S` and receives `R`. Ports
//! are moved (never cloned) when handed to another context, so each end has
//! exactly one owner. Sends never block; a send fails only once the other end
//! has been dropped.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;

use dbprobe_core::{encode_reply, CompatibilityReply};

use crate::error::{ChannelError, Result};

/// One end of a two-endpoint channel.
pub struct Port<S, R> {
    tx: mpsc::UnboundedSender<S>,
    rx: mpsc::UnboundedReceiver<R>,
}

impl<S, R> Port<S, R> {
    /// Post a message to the other end.
    pub fn send(&self, message: S) -> Result<()> {
        self.tx.send(message).map_err(|_| ChannelError::Closed)
    }

    /// Wait for the next message from the other end.
    ///
    /// Fails with [`ChannelError::Closed`] once the other end is dropped and
    /// every buffered message has been read.
    pub async fn recv(&mut self) -> Result<R> {
        self.rx.recv().await.ok_or(ChannelError::Closed)
    }

    /// Whether the other end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<S, R> fmt::Debug for Port<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Create a connected pair of ports.
pub fn message_channel<A, B>() -> (Port<A, B>, Port<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        Port { tx: a_tx, rx: b_rx },
        Port { tx: b_tx, rx: a_rx },
    )
}

/// Sending half of a probe reply channel, handed to a background context.
#[derive(Debug, Clone)]
pub struct ReplySender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ReplySender {
    /// Encode and post a compatibility reply.
    pub fn post(&self, reply: &CompatibilityReply) -> Result<()> {
        let payload = encode_reply(reply)?;
        self.post_raw(payload)
    }

    /// Post an already-encoded payload.
    pub fn post_raw(&self, payload: Bytes) -> Result<()> {
        self.tx.send(payload).map_err(|_| ChannelError::Closed)
    }
}

/// Receiving half of a probe reply channel.
#[derive(Debug)]
pub struct ReplyReceiver {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl ReplyReceiver {
    /// Wait for the next encoded reply. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// Create a reply channel for one compatibility check.
pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReplySender { tx }, ReplyReceiver { rx })
}
