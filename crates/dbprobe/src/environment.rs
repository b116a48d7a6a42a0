//! The runtime a probe runs in.

use std::sync::Arc;

use async_trait::async_trait;

use dbprobe_channel::{DedicatedContext, SharedContext};
use dbprobe_store::KeyValueStore;

use crate::connection::UpdateHub;

/// Capabilities of the caller's execution environment.
///
/// Each `supports_*` method answers whether the matching constructor exists
/// at all; the constructors themselves may still fail.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Whether dedicated contexts can be constructed.
    fn supports_dedicated(&self) -> bool;

    /// Start a dedicated context running `worker_uri`.
    fn spawn_dedicated(&self, worker_uri: &str) -> dbprobe_channel::Result<Box<dyn DedicatedContext>>;

    /// Whether shared contexts can be constructed.
    fn supports_shared(&self) -> bool;

    /// Connect to the shared context named `name`, starting it from
    /// `worker_uri` if it is not running yet.
    fn connect_shared(
        &self,
        worker_uri: &str,
        name: &str,
    ) -> dbprobe_channel::Result<Box<dyn SharedContext>>;

    /// The caller's own durable key/value store, for local hosting.
    async fn open_local_key_value(&self) -> dbprobe_store::Result<Arc<dyn KeyValueStore>>;

    /// The process-local update hub, if this environment has one.
    fn update_hub(&self) -> Option<Arc<UpdateHub>>;
}
