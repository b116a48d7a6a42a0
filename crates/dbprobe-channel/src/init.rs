//! The one-shot initialization handshake.
//!
//! ```text
//! Hosting side                         Caller side
//!   | (target file missing)               |
//!   |-------- request (reply slot) ------>|
//!   |                                     | run initializer once
//!   |<------- Option<Bytes> --------------|
//!   | (both ends released)                |
//! ```
//!
//! Each side holds a single-slot mailbox, so a request sent before the
//! caller's listener starts waiting is still delivered. Both halves are
//! consumed by use, so the exchange happens at most once.

use std::fmt::Display;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{ChannelError, Result};

type ReplySlot = oneshot::Sender<Option<Bytes>>;

/// Hosting-side half: asks the caller for initial database bytes.
#[derive(Debug)]
pub struct InitRequester {
    tx: oneshot::Sender<ReplySlot>,
}

/// Caller-side half: answers at most one request.
#[derive(Debug)]
pub struct InitResponder {
    rx: oneshot::Receiver<ReplySlot>,
}

/// Create a connected handshake pair.
pub fn init_channel() -> (InitResponder, InitRequester) {
    let (tx, rx) = oneshot::channel();
    (InitResponder { rx }, InitRequester { tx })
}

impl InitRequester {
    /// Ask for initial bytes and wait for the answer.
    ///
    /// `Ok(None)` means the caller explicitly has nothing to seed with.
    pub async fn request(self) -> Result<Option<Bytes>> {
        let (slot, answer) = oneshot::channel();
        self.tx.send(slot).map_err(|_| ChannelError::Closed)?;
        answer.await.map_err(|_| ChannelError::InitAborted)
    }
}

impl InitResponder {
    /// Wait for a request and answer it with `initializer`.
    ///
    /// Returns whether the initializer ran. If the hosting side releases the
    /// channel without asking, the initializer is never invoked. If the
    /// initializer fails, the reply slot is dropped so the hosting side sees
    /// [`ChannelError::InitAborted`].
    pub async fn respond<F, Fut, E>(self, initializer: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<Bytes>, E>>,
        E: Display,
    {
        let Ok(slot) = self.rx.await else {
            tracing::debug!("init channel released without a request");
            return false;
        };

        match initializer().await {
            Ok(data) => {
                if slot.send(data).is_err() {
                    tracing::debug!("hosting side went away before the init reply");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "database initializer failed");
            }
        }
        true
    }

    /// Spawn [`InitResponder::respond`] as a detached task.
    pub fn listen<F, Fut, E>(self, initializer: F) -> JoinHandle<bool>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Option<Bytes>, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        tokio::spawn(self.respond(initializer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_before_listener() {
        let (responder, requester) = init_channel();

        // The hosting side asks first; the listener attaches afterwards.
        let request = tokio::spawn(requester.request());
        tokio::task::yield_now().await;

        let ran = responder
            .listen(|| async { Ok::<_, std::io::Error>(Some(Bytes::from_static(b"seed"))) })
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(
            request.await.unwrap().unwrap(),
            Some(Bytes::from_static(b"seed"))
        );
    }

    #[tokio::test]
    async fn test_explicit_absence() {
        let (responder, requester) = init_channel();
        let listener = responder.listen(|| async { Ok::<_, std::io::Error>(None) });

        assert_eq!(requester.request().await.unwrap(), None);
        assert!(listener.await.unwrap());
    }

    #[tokio::test]
    async fn test_no_request_means_no_invocation() {
        let (responder, requester) = init_channel();
        drop(requester);

        let ran = responder
            .respond(|| async {
                Err::<Option<Bytes>, _>("initializer must not run")
            })
            .await;
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_failed_initializer_aborts_request() {
        let (responder, requester) = init_channel();
        let listener = responder.listen(|| async { Err::<Option<Bytes>, _>("disk on fire") });

        let err = requester.request().await.unwrap_err();
        assert!(matches!(err, ChannelError::InitAborted));
        assert!(listener.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_responder_closes_request() {
        let (responder, requester) = init_channel();
        drop(responder);
        assert!(matches!(
            requester.request().await,
            Err(ChannelError::Closed)
        ));
    }
}
