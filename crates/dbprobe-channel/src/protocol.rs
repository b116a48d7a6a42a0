//! The query protocol spoken over a query channel.
//!
//! The connection side wraps its [`ClientPort`] in a [`RemoteExecutor`]; the
//! hosting side runs [`serve`] over the matching [`ServerPort`].
//!
//! ```text
//! Connection                          Hosting context
//!   |-------- Hello ------------------>|
//!   |<------- Ready | Error -----------|
//!   |-------- Execute/Select/... ----->|
//!   |<------- Executed/Rows/... -------|
//!   |-------- Close ------------------>|
//!   |<------- Closed ------------------|
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dbprobe_core::{QueryResult, SqlValue};
use dbprobe_store::{Executor, StoreError};

use crate::error::{ChannelError, Result};
use crate::messages::{ClientPort, Envelope, QueryRequest, QueryResponse, ServerPort, PROTOCOL_VERSION};

/// An [`Executor`] that forwards every call over a query channel.
pub struct RemoteExecutor {
    port: Mutex<ClientPort>,
    next_id: AtomicU64,
}

impl RemoteExecutor {
    /// Perform the opening handshake and return a ready executor.
    ///
    /// Fails if the hosting side reports an error (for example, the database
    /// could not be opened or initialized) or releases the channel.
    pub async fn connect(port: ClientPort) -> Result<Self> {
        let executor = Self {
            port: Mutex::new(port),
            next_id: AtomicU64::new(1),
        };

        match executor
            .request(QueryRequest::Hello {
                protocol_version: PROTOCOL_VERSION,
            })
            .await?
        {
            QueryResponse::Ready => Ok(executor),
            QueryResponse::Error { message } => Err(ChannelError::Remote(message)),
            other => Err(ChannelError::UnexpectedMessage(format!(
                "expected Ready, got {other:?}"
            ))),
        }
    }

    async fn request(&self, body: QueryRequest) -> Result<QueryResponse> {
        let mut port = self.port.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        port.send(Envelope { id, body })?;

        loop {
            let response = port.recv().await?;
            if response.id == id {
                return Ok(response.body);
            }
            // Left over from a request whose caller stopped waiting.
            tracing::debug!(expected = id, got = response.id, "discarding stale response");
        }
    }
}

fn into_store_error(err: ChannelError) -> StoreError {
    match err {
        ChannelError::Closed => StoreError::Closed,
        ChannelError::Store(e) => e,
        ChannelError::Remote(message) => StoreError::Remote(message),
        other => StoreError::Remote(other.to_string()),
    }
}

fn unexpected(response: QueryResponse) -> StoreError {
    match response {
        QueryResponse::Error { message } => StoreError::Remote(message),
        other => StoreError::Remote(format!("unexpected response: {other:?}")),
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> dbprobe_store::Result<u64> {
        let request = QueryRequest::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        match self.request(request).await.map_err(into_store_error)? {
            QueryResponse::Executed { rows_affected } => Ok(rows_affected),
            other => Err(unexpected(other)),
        }
    }

    async fn execute_batch(&self, sql: &str) -> dbprobe_store::Result<()> {
        let request = QueryRequest::ExecuteBatch {
            sql: sql.to_string(),
        };
        match self.request(request).await.map_err(into_store_error)? {
            QueryResponse::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn select(&self, sql: &str, params: &[SqlValue]) -> dbprobe_store::Result<QueryResult> {
        let request = QueryRequest::Select {
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        match self.request(request).await.map_err(into_store_error)? {
            QueryResponse::Rows(rows) => Ok(rows),
            other => Err(unexpected(other)),
        }
    }

    async fn close(&self) -> dbprobe_store::Result<()> {
        match self.request(QueryRequest::Close).await.map_err(into_store_error)? {
            QueryResponse::Closed => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

/// Answer query requests on `port` until the connection closes or drops it.
///
/// `executor` is the outcome of opening the database; if opening failed,
/// every request (the handshake included) is answered with that error.
/// The executor itself is never closed here: it may be shared with other
/// channels, and its owner releases it.
pub async fn serve(mut port: ServerPort, executor: std::result::Result<Arc<dyn Executor>, StoreError>) {
    let mut ready = false;

    while let Ok(Envelope { id, body }) = port.recv().await {
        let closing = matches!(body, QueryRequest::Close);
        let response = match (&executor, body) {
            (_, QueryRequest::Hello { protocol_version }) if protocol_version != PROTOCOL_VERSION => {
                tracing::warn!(
                    local = PROTOCOL_VERSION,
                    peer = protocol_version,
                    "query protocol version mismatch"
                );
                QueryResponse::Error {
                    message: ChannelError::VersionMismatch {
                        local: PROTOCOL_VERSION,
                        peer: protocol_version,
                    }
                    .to_string(),
                }
            }
            (Err(e), _) => QueryResponse::Error {
                message: e.to_string(),
            },
            (Ok(_), QueryRequest::Hello { .. }) => {
                ready = true;
                QueryResponse::Ready
            }
            (Ok(_), QueryRequest::Close) => QueryResponse::Closed,
            (Ok(_), _) if !ready => QueryResponse::Error {
                message: "handshake required before queries".into(),
            },
            (Ok(db), request) => answer(db.as_ref(), request).await,
        };

        if port.send(Envelope { id, body: response }).is_err() || closing {
            break;
        }
    }

    tracing::debug!("query channel released");
}

async fn answer(db: &dyn Executor, request: QueryRequest) -> QueryResponse {
    let outcome = match request {
        QueryRequest::Execute { sql, params } => db
            .execute(&sql, &params)
            .await
            .map(|rows_affected| QueryResponse::Executed { rows_affected }),
        QueryRequest::ExecuteBatch { sql } => {
            db.execute_batch(&sql).await.map(|()| QueryResponse::Done)
        }
        QueryRequest::Select { sql, params } => {
            db.select(&sql, &params).await.map(QueryResponse::Rows)
        }
        QueryRequest::Hello { .. } => Ok(QueryResponse::Ready),
        QueryRequest::Close => Ok(QueryResponse::Closed),
    };

    outcome.unwrap_or_else(|e| QueryResponse::Error {
        message: e.to_string(),
    })
}
