//! Which background context hosts the chosen backend.

use std::fmt;

use dbprobe_channel::{DedicatedContext, SharedContext, WorkerRequest};
use dbprobe_core::{Hosting, StorageBackend};

/// Context handles that survived probing.
#[derive(Default)]
pub struct ContextHandles {
    shared: Option<Box<dyn SharedContext>>,
    dedicated: Option<Box<dyn DedicatedContext>>,
}

/// Where a database ends up hosted.
pub enum Host {
    Shared(Box<dyn SharedContext>),
    Dedicated(Box<dyn DedicatedContext>),
    /// In the caller's own context.
    Local,
}

impl ContextHandles {
    pub fn new(
        shared: Option<Box<dyn SharedContext>>,
        dedicated: Option<Box<dyn DedicatedContext>>,
    ) -> Self {
        Self { shared, dedicated }
    }

    pub fn has_shared(&self) -> bool {
        self.shared.is_some()
    }

    pub fn has_dedicated(&self) -> bool {
        self.dedicated.is_some()
    }

    /// Keep the context that hosts `backend` and dispose of the other.
    ///
    /// Falls back to [`Host::Local`] when the authoritative handle is gone.
    /// Disposal never posts a message.
    pub fn select(self, backend: StorageBackend) -> Host {
        let Self { shared, dedicated } = self;

        let host = match backend.hosting() {
            Hosting::Shared => {
                if let Some(dedicated) = dedicated {
                    dedicated.terminate();
                }
                shared.map(Host::Shared)
            }
            Hosting::Dedicated => {
                if let Some(shared) = shared {
                    shared.close();
                }
                dedicated.map(Host::Dedicated)
            }
            Hosting::Local => {
                if let Some(shared) = shared {
                    shared.close();
                }
                if let Some(dedicated) = dedicated {
                    dedicated.terminate();
                }
                None
            }
        };

        match host {
            Some(host) => {
                tracing::debug!(%backend, host = %host, "authoritative context selected");
                host
            }
            None => {
                tracing::debug!(%backend, "no context for backend, hosting locally");
                Host::Local
            }
        }
    }

    /// Dispose of every handle.
    pub fn dispose(self) {
        if let Some(shared) = self.shared {
            shared.close();
        }
        if let Some(dedicated) = self.dedicated {
            dedicated.terminate();
        }
    }
}

impl fmt::Debug for ContextHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandles")
            .field("shared", &self.has_shared())
            .field("dedicated", &self.has_dedicated())
            .finish()
    }
}

impl Host {
    /// Post to the hosting context. Posting to [`Host::Local`] is a logic
    /// error and reports a closed channel.
    pub(crate) fn post(&self, request: WorkerRequest) -> dbprobe_channel::Result<()> {
        match self {
            Host::Shared(context) => context.post(request),
            Host::Dedicated(context) => context.post(request),
            Host::Local => Err(dbprobe_channel::ChannelError::Closed),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Host::Local)
    }

    /// Release the hosting context.
    pub(crate) fn dispose(self) {
        match self {
            Host::Shared(context) => context.close(),
            Host::Dedicated(context) => context.terminate(),
            Host::Local => {}
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Host::Shared(_) => "shared",
            Host::Dedicated(_) => "dedicated",
            Host::Local => "local",
        })
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        posts: AtomicUsize,
        disposals: AtomicUsize,
    }

    struct Context(Arc<Calls>);

    impl DedicatedContext for Context {
        fn post(&self, _request: WorkerRequest) -> dbprobe_channel::Result<()> {
            self.0.posts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn terminate(&self) {
            self.0.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl SharedContext for Context {
        fn post(&self, _request: WorkerRequest) -> dbprobe_channel::Result<()> {
            self.0.posts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) {
            self.0.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handles() -> (ContextHandles, Arc<Calls>, Arc<Calls>) {
        let shared = Arc::new(Calls::default());
        let dedicated = Arc::new(Calls::default());
        let handles = ContextHandles::new(
            Some(Box::new(Context(shared.clone()))),
            Some(Box::new(Context(dedicated.clone()))),
        );
        (handles, shared, dedicated)
    }

    #[test]
    fn test_shared_backend_terminates_dedicated() {
        let (handles, shared, dedicated) = handles();
        let host = handles.select(StorageBackend::SharedDurableStore);

        assert!(matches!(host, Host::Shared(_)));
        assert_eq!(dedicated.disposals.load(Ordering::SeqCst), 1);
        assert_eq!(shared.disposals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dedicated_backend_closes_shared() {
        let (handles, shared, dedicated) = handles();
        let host = handles.select(StorageBackend::DedicatedKeyValueUnsafe);

        assert!(matches!(host, Host::Dedicated(_)));
        assert_eq!(shared.disposals.load(Ordering::SeqCst), 1);
        assert_eq!(dedicated.disposals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_in_memory_disposes_both_without_posting() {
        let (handles, shared, dedicated) = handles();
        let host = handles.select(StorageBackend::InMemory);

        assert!(host.is_local());
        for calls in [shared, dedicated] {
            assert_eq!(calls.disposals.load(Ordering::SeqCst), 1);
            assert_eq!(calls.posts.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_missing_handle_falls_back_to_local() {
        let shared = Arc::new(Calls::default());
        let handles = ContextHandles::new(Some(Box::new(Context(shared.clone()))), None);

        let host = handles.select(StorageBackend::DedicatedDurableStore);
        assert!(host.is_local());
        assert_eq!(shared.disposals.load(Ordering::SeqCst), 1);
    }
}
