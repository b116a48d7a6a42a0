//! SQLite hosting on top of a virtual file system.
//!
//! rusqlite works on real files, so a [`LocalDatabase`] materializes the
//! virtual file into a private scratch directory, opens it there, and copies
//! the file back into the virtual file system whenever a write leaves the
//! connection outside a transaction. All engine calls run through
//! `tokio::task::spawn_blocking`.
//!
//! Snapshots are numbered while the connection lock is held, and a snapshot
//! older than the last one written is dropped instead of written.

use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tempfile::TempDir;

use dbprobe_core::{QueryResult, SqlValue};

use crate::error::{Result, StoreError};
use crate::traits::{Executor, VirtualFileSystem};

/// Hook run on the raw connection right after it is opened.
pub type LocalSetup = Arc<dyn Fn(&Connection) -> rusqlite::Result<()> + Send + Sync>;

/// Seed `path` with bytes from `initializer`, but only if no file exists yet.
///
/// Returns whether the initializer was invoked. An initializer returning
/// `None` leaves the file absent and the engine creates an empty database.
pub async fn initialize_if_missing<F, Fut, E>(
    fs: &dyn VirtualFileSystem,
    path: &str,
    initializer: F,
) -> Result<bool>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<Option<Bytes>, E>>,
    E: Display,
{
    if fs.exists(path).await? {
        tracing::debug!(path, "database exists, skipping initializer");
        return Ok(false);
    }

    let data = initializer()
        .await
        .map_err(|e| StoreError::Initialization(e.to_string()))?;

    if let Some(data) = data {
        tracing::debug!(path, len = data.len(), "writing initial database bytes");
        fs.write(path, data).await?;
    }
    Ok(true)
}

/// A database hosted by the embedded engine in this context.
pub struct LocalDatabase {
    conn: Arc<Mutex<Option<Connection>>>,
    fs: Arc<dyn VirtualFileSystem>,
    path: String,
    working: PathBuf,
    _scratch: TempDir,
    taken: Arc<AtomicU64>,
    written: tokio::sync::Mutex<u64>,
}

/// File bytes captured after a committed write.
struct Snapshot {
    seq: u64,
    data: Bytes,
}

impl LocalDatabase {
    /// Open the database stored at `path` in `fs`, creating it if absent.
    pub async fn open(
        fs: Arc<dyn VirtualFileSystem>,
        path: &str,
        setup: Option<LocalSetup>,
    ) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("dbprobe-").tempdir()?;
        let working = scratch.path().join("database");
        let existing = fs.read(path).await?;

        let conn = {
            let working = working.clone();
            tokio::task::spawn_blocking(move || -> Result<Connection> {
                if let Some(data) = existing {
                    std::fs::write(&working, &data)?;
                }
                let conn = Connection::open(&working)?;
                // Committed pages must land in the main file for write-back.
                let _mode: String = conn.pragma_update_and_check(
                    None,
                    "journal_mode",
                    "DELETE",
                    |row| row.get(0),
                )?;
                if let Some(setup) = setup {
                    setup(&conn)?;
                }
                Ok(conn)
            })
            .await??
        };

        tracing::debug!(path, working = %working.display(), "opened local database");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            fs,
            path: path.to_string(),
            working,
            _scratch: scratch,
            taken: Arc::new(AtomicU64::new(0)),
            written: tokio::sync::Mutex::new(0),
        })
    }

    /// Run `f` on the connection in a blocking task.
    ///
    /// If `f` leaves the connection in autocommit mode and `write_back` is
    /// set, a numbered snapshot of the file is returned alongside the result
    /// so it can be copied into the virtual file system.
    async fn with_conn<F, T>(&self, write_back: bool, f: F) -> Result<(T, Option<Snapshot>)>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let working = self.working.clone();
        let taken = self.taken.clone();

        tokio::task::spawn_blocking(move || -> Result<(T, Option<Snapshot>)> {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("connection mutex: {}", e)))?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;

            let value = f(conn)?;
            let snapshot = if write_back && conn.is_autocommit() {
                Some(Snapshot {
                    seq: taken.fetch_add(1, Ordering::SeqCst) + 1,
                    data: Bytes::from(std::fs::read(&working)?),
                })
            } else {
                None
            };
            Ok((value, snapshot))
        })
        .await?
    }

    async fn write_back(&self, snapshot: Option<Snapshot>) -> Result<()> {
        let Some(snapshot) = snapshot else {
            return Ok(());
        };

        let mut written = self.written.lock().await;
        if snapshot.seq <= *written {
            tracing::trace!(seq = snapshot.seq, written = *written, "skipping stale snapshot");
            return Ok(());
        }
        self.fs.write(&self.path, snapshot.data).await?;
        *written = snapshot.seq;
        Ok(())
    }
}

#[async_trait]
impl Executor for LocalDatabase {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let sql = sql.to_string();
        let values: Vec<Value> = params.iter().map(to_value).collect();

        let (changed, snapshot) = self
            .with_conn(true, move |conn| {
                let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
                Ok(changed as u64)
            })
            .await?;

        self.write_back(snapshot).await?;
        Ok(changed)
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();

        let ((), snapshot) = self
            .with_conn(true, move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;

        self.write_back(snapshot).await
    }

    async fn select(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let sql = sql.to_string();
        let values: Vec<Value> = params.iter().map(to_value).collect();

        let (result, _) = self
            .with_conn(false, move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let width = columns.len();

                let rows = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        (0..width)
                            .map(|i| row.get_ref(i).map(from_value_ref))
                            .collect::<rusqlite::Result<Vec<_>>>()
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(QueryResult { columns, rows })
            })
            .await?;

        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("connection mutex: {}", e)))?;
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::Database(e)),
                None => Ok(()),
            }
        })
        .await?
    }
}

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.to_vec()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => SqlValue::Blob(Bytes::copy_from_slice(v)),
    }
}
