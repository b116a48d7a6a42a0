//! Connection establisher: turn a probe result into one live connection.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use dbprobe_channel::{
    init_channel, query_channel, ChannelError, RemoteExecutor, ServeRequest, WorkerRequest,
};
use dbprobe_core::{MissingFeature, StorageBackend};
use dbprobe_store::{
    initialize_if_missing, Executor, KeyValueFileSystem, LocalDatabase, MemoryFileSystem,
    StoreError, VirtualFileSystem, DATABASE_PATH,
};

use crate::config::ProbeConfig;
use crate::connection::Connection;
use crate::environment::Environment;
use crate::error::{DatabaseError, Result};
use crate::lifecycle::Host;
use crate::probe::{probe, ProbeResult};

/// Future produced by an [`Initializer`].
pub type InitFuture = Pin<Box<dyn Future<Output = anyhow::Result<Option<Bytes>>> + Send>>;

/// Supplies the initial bytes of a database that does not exist yet.
///
/// Invoked at most once per open. `Ok(None)` creates an empty database.
pub type Initializer = Box<dyn FnOnce() -> InitFuture + Send>;

/// Box an async closure as an [`Initializer`].
pub fn initializer<F, Fut>(f: F) -> Initializer
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<Option<Bytes>>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as InitFuture)
}

impl ProbeResult {
    /// Open database `name` on `backend`, consuming the probe's contexts.
    ///
    /// If the context that hosts `backend` did not survive probing, the
    /// database is hosted in this context instead. Once a serve request has
    /// been posted, failures are returned rather than retried locally.
    pub async fn open(
        self,
        backend: StorageBackend,
        name: &str,
        initializer: Option<Initializer>,
    ) -> Result<Connection> {
        let ProbeResult {
            catalog,
            handles,
            env,
            config,
        } = self;

        if !catalog.contains(backend) {
            tracing::debug!(%backend, "backend was not proven viable");
        }

        match handles.select(backend) {
            Host::Local => open_local(env.as_ref(), &config, backend, name, initializer).await,
            host => open_remote(env.as_ref(), &config, host, backend, name, initializer).await,
        }
    }
}

async fn open_remote(
    env: &dyn Environment,
    config: &ProbeConfig,
    host: Host,
    backend: StorageBackend,
    name: &str,
    initializer: Option<Initializer>,
) -> Result<Connection> {
    let (client, server) = query_channel();

    // The listener is running before the serve request can reach the host.
    let init_port = initializer.map(|initializer| {
        let (responder, requester) = init_channel();
        responder.listen(initializer);
        requester
    });

    let posted = host.post(WorkerRequest::Serve(ServeRequest {
        engine_uri: config.engine_uri.clone(),
        backend,
        database_name: name.to_string(),
        query_port: server,
        init_port,
    }));
    if let Err(e) = posted {
        host.dispose();
        return Err(e.into());
    }
    tracing::info!(%backend, database = name, host = %host, "hosting database remotely");

    let executor = match RemoteExecutor::connect(client).await {
        Ok(executor) => executor,
        Err(e) => {
            tracing::warn!(database = name, error = %e, "remote open failed");
            host.dispose();
            return Err(match e {
                ChannelError::Remote(message) => DatabaseError::Remote(message),
                other => DatabaseError::Channel(other),
            });
        }
    };

    let updates = match (&host, env.update_hub()) {
        (Host::Dedicated(_), Some(hub)) if config.stream_updates && backend.broadcasts_writes() => {
            tracing::debug!(database = name, "joining update hub");
            Some(hub.topic(name))
        }
        _ => None,
    };

    Ok(Connection::new(
        name,
        backend,
        Arc::new(executor),
        updates,
        host,
    ))
}

async fn open_local(
    env: &dyn Environment,
    config: &ProbeConfig,
    backend: StorageBackend,
    name: &str,
    initializer: Option<Initializer>,
) -> Result<Connection> {
    let fs: Arc<dyn VirtualFileSystem> = if backend.is_durable() {
        let store = env.open_local_key_value().await?;
        Arc::new(KeyValueFileSystem::new(store, name))
    } else {
        Arc::new(MemoryFileSystem::new())
    };

    if let Some(initializer) = initializer {
        initialize_if_missing(fs.as_ref(), DATABASE_PATH, initializer)
            .await
            .map_err(|e| {
                if let StoreError::Initialization(reason) = &e {
                    tracing::warn!(database = name, %reason, "database initializer failed");
                }
                e
            })?;
    }

    let db = LocalDatabase::open(fs, DATABASE_PATH, config.local_setup.clone()).await?;
    tracing::info!(%backend, database = name, "hosting database locally");

    Ok(Connection::new(
        name,
        backend,
        Arc::new(db) as Arc<dyn Executor>,
        None,
        Host::Local,
    ))
}

/// A connection together with how it was chosen.
#[derive(Debug)]
pub struct OpenedDatabase {
    pub connection: Connection,
    pub backend: StorageBackend,
    pub missing_features: BTreeSet<MissingFeature>,
}

/// Probe `env`, pick [`ProbeResult::preferred_backend`] for `name`, and open
/// it.
pub async fn open_database(
    env: Arc<dyn Environment>,
    config: ProbeConfig,
    name: &str,
    initializer: Option<Initializer>,
) -> Result<OpenedDatabase> {
    let result = probe(env, config).await;
    let backend = result.preferred_backend(name);
    let missing_features = result.missing_features().clone();

    let connection = result.open(backend, name, initializer).await?;
    Ok(OpenedDatabase {
        connection,
        backend,
        missing_features,
    })
}
