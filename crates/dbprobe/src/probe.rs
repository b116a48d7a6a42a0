//! Feature probe: ask both background contexts what they can do.
//!
//! ```text
//! Caller                    Dedicated            Shared
//!   |-- compatibility-check -->|                    |
//!   |-- compatibility-check ----------------------->|
//!   |<-- dedicated-result | error | (closed) -------|
//!   |<-- shared-result | error | (closed) ----------|
//! ```
//!
//! Both attempts run concurrently. A failed attempt disposes its context and
//! is recorded as a missing feature; probing itself never fails.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use dbprobe_channel::{reply_channel, ChannelError, DedicatedContext, SharedContext, WorkerRequest};
use dbprobe_core::{
    decode_reply, CompatibilityCheck, CompatibilityReply, DatabaseLocation, DedicatedCompatibility,
    ExistingDatabase, MissingFeature, SharedCompatibility, StorageBackend,
};

use crate::catalog::BackendCatalog;
use crate::config::ProbeConfig;
use crate::environment::Environment;
use crate::error::{DatabaseError, Result};
use crate::lifecycle::ContextHandles;

/// Outcome of [`probe`]: the viable backends and the live contexts needed to
/// open one of them.
pub struct ProbeResult {
    pub(crate) catalog: BackendCatalog,
    pub(crate) handles: ContextHandles,
    pub(crate) env: Arc<dyn Environment>,
    pub(crate) config: ProbeConfig,
}

/// Probe `env` for viable storage backends.
pub async fn probe(env: Arc<dyn Environment>, config: ProbeConfig) -> ProbeResult {
    let check = CompatibilityCheck {
        database_name_hint: config.database_name_hint.clone(),
    };

    let (dedicated, shared) = tokio::join!(
        probe_dedicated(env.as_ref(), &config, &check),
        probe_shared(env.as_ref(), &config, &check),
    );

    let hint = &config.database_name_hint;
    let mut catalog = BackendCatalog::new();

    let dedicated = match dedicated {
        Some((context, reply)) => {
            catalog.add_dedicated(&reply, hint);
            Some(context)
        }
        None => {
            catalog.record_missing(MissingFeature::DedicatedContexts);
            None
        }
    };
    let shared = match shared {
        Some((context, reply)) => {
            catalog.add_shared(&reply, hint);
            Some(context)
        }
        None => {
            catalog.record_missing(MissingFeature::SharedContexts);
            None
        }
    };

    tracing::debug!(
        backends = ?catalog.backends(),
        missing = ?catalog.missing_features(),
        "probe complete"
    );

    ProbeResult {
        catalog,
        handles: ContextHandles::new(shared, dedicated),
        env,
        config,
    }
}

async fn probe_dedicated(
    env: &dyn Environment,
    config: &ProbeConfig,
    check: &CompatibilityCheck,
) -> Option<(Box<dyn DedicatedContext>, DedicatedCompatibility)> {
    if !env.supports_dedicated() {
        tracing::debug!("dedicated contexts unavailable");
        return None;
    }

    let context = match env.spawn_dedicated(&config.worker_uri) {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(error = %e, "failed to start dedicated context");
            return None;
        }
    };

    match request_compatibility(check, |request| context.post(request)).await {
        Ok(CompatibilityReply::DedicatedResult(reply)) => {
            tracing::debug!(?reply, "dedicated context replied");
            Some((context, reply))
        }
        Ok(other) => {
            tracing::warn!(?other, "dedicated context sent the wrong reply shape");
            context.terminate();
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "dedicated probe failed");
            context.terminate();
            None
        }
    }
}

async fn probe_shared(
    env: &dyn Environment,
    config: &ProbeConfig,
    check: &CompatibilityCheck,
) -> Option<(Box<dyn SharedContext>, SharedCompatibility)> {
    if !env.supports_shared() {
        tracing::debug!("shared contexts unavailable");
        return None;
    }

    let context = match env.connect_shared(&config.worker_uri, &config.shared_context_name) {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(error = %e, "failed to connect to shared context");
            return None;
        }
    };

    match request_compatibility(check, |request| context.post(request)).await {
        Ok(CompatibilityReply::SharedResult(reply)) => {
            tracing::debug!(?reply, "shared context replied");
            Some((context, reply))
        }
        Ok(other) => {
            tracing::warn!(?other, "shared context sent the wrong reply shape");
            context.close();
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "shared probe failed");
            context.close();
            None
        }
    }
}

/// Post a compatibility check and read exactly one reply.
///
/// The reply channel is dropped on return, so later messages are discarded.
async fn request_compatibility<P>(
    check: &CompatibilityCheck,
    post: P,
) -> dbprobe_channel::Result<CompatibilityReply>
where
    P: FnOnce(WorkerRequest) -> dbprobe_channel::Result<()>,
{
    let (reply, mut replies) = reply_channel();
    post(WorkerRequest::CompatibilityCheck {
        check: check.clone(),
        reply,
    })?;

    let payload = replies.next().await.ok_or(ChannelError::Closed)?;
    match decode_reply(&payload)? {
        CompatibilityReply::Error(error) => Err(ChannelError::Remote(error.detail)),
        reply => Ok(reply),
    }
}

impl ProbeResult {
    /// Viable backends, in-memory first.
    pub fn available_backends(&self) -> Vec<StorageBackend> {
        self.catalog.backends()
    }

    /// Databases the contexts reported as already existing.
    pub fn existing_databases(&self) -> &BTreeSet<ExistingDatabase> {
        self.catalog.existing_databases()
    }

    /// Features found missing while probing.
    pub fn missing_features(&self) -> &BTreeSet<MissingFeature> {
        self.catalog.missing_features()
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    /// Live context handles kept from probing.
    pub fn handles(&self) -> &ContextHandles {
        &self.handles
    }

    /// See [`BackendCatalog::preferred_backend`].
    pub fn preferred_backend(&self, name: &str) -> StorageBackend {
        self.catalog.preferred_backend(name)
    }

    /// Deleting databases is not supported.
    pub fn delete_database(&self, location: DatabaseLocation, name: &str) -> Result<()> {
        Err(DatabaseError::Unsupported(format!(
            "deleting database {name:?} from {location:?}"
        )))
    }

    /// Release every context without opening anything.
    pub fn dispose(self) {
        self.handles.dispose();
    }
}

impl fmt::Debug for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeResult")
            .field("catalog", &self.catalog)
            .field("handles", &self.handles)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
