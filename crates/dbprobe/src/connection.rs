//! The connection handed back to the caller, and the process-local update hub.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use dbprobe_core::{QueryResult, SqlValue, StorageBackend};
use dbprobe_store::Executor;

use crate::error::Result;
use crate::lifecycle::Host;

/// Buffered update events per database before slow subscribers lag.
const TOPIC_CAPACITY: usize = 64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A write happened on database `database` through connection `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    pub database: String,
    pub origin: ConnectionId,
}

/// Process-local registry of update topics, one per database name.
#[derive(Default)]
pub struct UpdateHub {
    topics: Mutex<HashMap<String, broadcast::Sender<UpdateEvent>>>,
}

impl UpdateHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The topic for database `name`, created on first use.
    pub fn topic(&self, name: &str) -> broadcast::Sender<UpdateEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl fmt::Debug for UpdateHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("UpdateHub")
            .field("topics", &topics.len())
            .finish()
    }
}

/// Updates made by other connections to the same database.
#[derive(Debug)]
pub struct Updates {
    origin: ConnectionId,
    rx: broadcast::Receiver<UpdateEvent>,
}

impl Updates {
    /// Wait for the next write made elsewhere. `None` once the topic is gone.
    pub async fn next(&mut self) -> Option<UpdateEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.origin => continue,
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "update subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next already-delivered write made elsewhere, if any.
    pub fn try_next(&mut self) -> Option<UpdateEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.origin => continue,
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// A live database connection.
///
/// Owns whatever keeps the database reachable: the hosting context for a
/// remote database, the engine itself for a local one.
pub struct Connection {
    id: ConnectionId,
    name: String,
    backend: StorageBackend,
    executor: Arc<dyn Executor>,
    updates: Option<broadcast::Sender<UpdateEvent>>,
    host: Host,
}

impl Connection {
    pub(crate) fn new(
        name: &str,
        backend: StorageBackend,
        executor: Arc<dyn Executor>,
        updates: Option<broadcast::Sender<UpdateEvent>>,
        host: Host,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            name: name.to_string(),
            backend,
            executor,
            updates,
            host,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend this connection was opened on.
    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Whether the database is hosted in a background context.
    pub fn is_remote(&self) -> bool {
        !self.host.is_local()
    }

    /// Whether writes are broadcast to other connections in this process.
    pub fn has_updates(&self) -> bool {
        self.updates.is_some()
    }

    /// Run one statement.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let changed = self.executor.execute(sql, params).await?;
        self.publish();
        Ok(changed)
    }

    /// Run several statements.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.executor.execute_batch(sql).await?;
        self.publish();
        Ok(())
    }

    /// Run a query.
    pub async fn select(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        Ok(self.executor.select(sql, params).await?)
    }

    /// Subscribe to writes made by other connections to this database.
    ///
    /// `None` if the connection has no update capability.
    pub fn subscribe(&self) -> Option<Updates> {
        self.updates.as_ref().map(|topic| Updates {
            origin: self.id,
            rx: topic.subscribe(),
        })
    }

    /// Close the database and release the hosting context.
    pub async fn close(self) -> Result<()> {
        let result = self.executor.close().await;
        self.host.dispose();
        tracing::debug!(database = %self.name, "connection closed");
        Ok(result?)
    }

    fn publish(&self) {
        if let Some(topic) = &self.updates {
            // No subscribers is fine.
            let _ = topic.send(UpdateEvent {
                database: self.name.clone(),
                origin: self.id,
            });
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("updates", &self.updates.is_some())
            .finish()
    }
}
