//! Probe and open configuration.

use std::fmt;

use dbprobe_core::DEFAULT_NAME_HINT;
use dbprobe_store::LocalSetup;

/// Configuration for [`probe`](crate::probe) and the open that follows it.
#[derive(Clone)]
pub struct ProbeConfig {
    /// Script that background contexts are started from.
    pub worker_uri: String,
    /// Location of the SQL engine module a hosting context loads.
    pub engine_uri: String,
    /// Name the shared context is connected under.
    pub shared_context_name: String,
    /// Database name sent with compatibility checks. Legacy existence flags
    /// in replies refer to this name.
    pub database_name_hint: String,
    /// Whether connections carry an update capability where the backend
    /// supports one.
    pub stream_updates: bool,
    /// Hook run on every locally opened engine connection.
    pub local_setup: Option<LocalSetup>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            worker_uri: "dbprobe-worker.js".into(),
            engine_uri: "sqlite3.wasm".into(),
            shared_context_name: "dbprobe-shared".into(),
            database_name_hint: DEFAULT_NAME_HINT.into(),
            stream_updates: true,
            local_setup: None,
        }
    }
}

impl ProbeConfig {
    pub fn with_worker_uri(mut self, uri: impl Into<String>) -> Self {
        self.worker_uri = uri.into();
        self
    }

    pub fn with_engine_uri(mut self, uri: impl Into<String>) -> Self {
        self.engine_uri = uri.into();
        self
    }

    pub fn with_shared_context_name(mut self, name: impl Into<String>) -> Self {
        self.shared_context_name = name.into();
        self
    }

    /// Ask about `name` in compatibility checks instead of the sentinel.
    pub fn with_database_name_hint(mut self, name: impl Into<String>) -> Self {
        self.database_name_hint = name.into();
        self
    }

    pub fn with_stream_updates(mut self, enabled: bool) -> Self {
        self.stream_updates = enabled;
        self
    }

    pub fn with_local_setup(mut self, setup: LocalSetup) -> Self {
        self.local_setup = Some(setup);
        self
    }
}

impl fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("worker_uri", &self.worker_uri)
            .field("engine_uri", &self.engine_uri)
            .field("shared_context_name", &self.shared_context_name)
            .field("database_name_hint", &self.database_name_hint)
            .field("stream_updates", &self.stream_updates)
            .field("local_setup", &self.local_setup.is_some())
            .finish()
    }
}
