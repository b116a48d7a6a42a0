//! Fake environment and background contexts.
//!
//! The fakes speak the real protocol: compatibility checks are answered with
//! encoded replies, and serve requests host a real SQLite database (through
//! [`LocalDatabase`]) behind [`serve`]. Every context spawned by one
//! [`FakeEnvironment`] sees the same durable and key/value stores, and
//! databases already hosted under a name are reused, so two connections to
//! one name observe each other's writes.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dbprobe::{Environment, UpdateHub};
use dbprobe_channel::{
    serve, ChannelError, DedicatedContext, InitRequester, ReplySender, ServeRequest,
    SharedContext, WorkerRequest,
};
use dbprobe_core::{
    CompatibilityReply, DatabaseLocation, DedicatedCompatibility, ExistingDatabase,
    SharedCompatibility, WorkerError,
};
use dbprobe_store::{
    database_names, initialize_if_missing, Executor, KeyValueFileSystem, KeyValueStore,
    LocalDatabase, MemoryFileSystem, MemoryKeyValueStore, StoreError, VirtualFileSystem,
    DATABASE_PATH,
};

/// How a fake context behaves when probed.
#[derive(Debug, Clone)]
pub enum ContextBehavior {
    /// The runtime has no constructor for this kind of context.
    Unsupported,
    /// The constructor exists but throws.
    FailsToStart,
    /// Answer with this reply.
    Reply(CompatibilityReply),
    /// Answer with this reply, then keep sending junk on the reply channel.
    ReplyThenJunk(CompatibilityReply),
    /// Answer with bytes that do not decode.
    Garbage,
    /// Drop the reply channel without answering.
    Closes,
}

impl ContextBehavior {
    /// A worker-error reply.
    pub fn error(detail: &str) -> Self {
        ContextBehavior::Reply(CompatibilityReply::Error(WorkerError {
            detail: detail.to_string(),
        }))
    }

    fn is_supported(&self) -> bool {
        !matches!(self, ContextBehavior::Unsupported)
    }
}

/// A dedicated reply with the given capability flags.
pub fn dedicated_result(nested: bool, durable: bool, locks: bool, key_value: bool) -> CompatibilityReply {
    CompatibilityReply::DedicatedResult(DedicatedCompatibility {
        supports_nested_workers: nested,
        can_access_durable_store: durable,
        supports_shared_memory_locks: locks,
        supports_key_value_store: key_value,
        ..Default::default()
    })
}

/// A shared reply with the given capability flags.
pub fn shared_result(spawn: bool, durable: bool, key_value: bool) -> CompatibilityReply {
    CompatibilityReply::SharedResult(SharedCompatibility {
        can_spawn_dedicated: spawn,
        dedicated_can_access_durable_store: durable,
        can_use_key_value_store: key_value,
        ..Default::default()
    })
}

/// What happened to one fake context.
#[derive(Debug, Default)]
pub struct ContextStats {
    checks: AtomicUsize,
    serves: AtomicUsize,
    disposed: AtomicBool,
}

impl ContextStats {
    /// Compatibility checks posted.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Serve requests posted.
    pub fn serves(&self) -> usize {
        self.serves.load(Ordering::SeqCst)
    }

    /// Every request posted.
    pub fn posts(&self) -> usize {
        self.checks() + self.serves()
    }

    /// Whether the context was closed or terminated.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// State shared by every worker of one environment.
#[derive(Default)]
struct WorkerHost {
    durable: Arc<MemoryKeyValueStore>,
    key_value: Arc<MemoryKeyValueStore>,
    hosted: tokio::sync::Mutex<HashMap<(DatabaseLocation, String), Weak<LocalDatabase>>>,
    init_requests: AtomicUsize,
}

impl WorkerHost {
    async fn database(
        &self,
        request: &ServeRequest,
        init_port: Option<InitRequester>,
    ) -> Result<Arc<dyn Executor>, StoreError> {
        let name = request.database_name.as_str();
        let Some(location) = request.backend.location() else {
            let fs: Arc<dyn VirtualFileSystem> = Arc::new(MemoryFileSystem::new());
            self.seed(fs.as_ref(), init_port).await?;
            return Ok(Arc::new(LocalDatabase::open(fs, DATABASE_PATH, None).await?));
        };

        let mut hosted = self.hosted.lock().await;
        let key = (location, name.to_string());
        if let Some(db) = hosted.get(&key).and_then(Weak::upgrade) {
            return Ok(db);
        }

        let store: Arc<dyn KeyValueStore> = match location {
            DatabaseLocation::DurableStore => self.durable.clone(),
            DatabaseLocation::KeyValue => self.key_value.clone(),
        };
        let fs: Arc<dyn VirtualFileSystem> = Arc::new(KeyValueFileSystem::new(store, name));
        self.seed(fs.as_ref(), init_port).await?;

        let db = Arc::new(LocalDatabase::open(fs, DATABASE_PATH, None).await?);
        hosted.insert(key, Arc::downgrade(&db));
        Ok(db)
    }

    async fn seed(
        &self,
        fs: &dyn VirtualFileSystem,
        init_port: Option<InitRequester>,
    ) -> Result<(), StoreError> {
        if let Some(port) = init_port {
            initialize_if_missing(fs, DATABASE_PATH, || {
                self.init_requests.fetch_add(1, Ordering::SeqCst);
                port.request()
            })
            .await?;
        }
        Ok(())
    }

    /// Databases already stored in the stores a worker can reach.
    async fn existing_databases(&self, durable: bool, key_value: bool) -> BTreeSet<ExistingDatabase> {
        let stores = [
            (durable, DatabaseLocation::DurableStore, &self.durable),
            (key_value, DatabaseLocation::KeyValue, &self.key_value),
        ];

        let mut found = BTreeSet::new();
        for (reachable, location, store) in stores {
            if !reachable {
                continue;
            }
            match database_names(store.as_ref()).await {
                Ok(names) => found.extend(
                    names
                        .into_iter()
                        .map(|name| ExistingDatabase::new(location, name)),
                ),
                Err(e) => tracing::debug!(error = %e, ?location, "fake worker could not list databases"),
            }
        }
        found
    }

    /// `reply` with the databases this worker can see added to it.
    async fn report(&self, reply: &CompatibilityReply) -> CompatibilityReply {
        let mut reply = reply.clone();
        match &mut reply {
            CompatibilityReply::DedicatedResult(result) => {
                let found = self
                    .existing_databases(result.can_access_durable_store, result.supports_key_value_store)
                    .await;
                result.existing_databases.extend(found);
            }
            CompatibilityReply::SharedResult(result) => {
                let found = self
                    .existing_databases(
                        result.dedicated_can_access_durable_store,
                        result.can_use_key_value_store,
                    )
                    .await;
                result.existing_databases.extend(found);
            }
            CompatibilityReply::Error(_) => {}
        }
        reply
    }
}

async fn host_database(host: Arc<WorkerHost>, mut request: ServeRequest) {
    let init_port = request.init_port.take();
    let executor = host.database(&request, init_port).await;
    if let Err(e) = &executor {
        tracing::debug!(error = %e, database = %request.database_name, "fake worker failed to open");
    }
    serve(request.query_port, executor).await;
}

async fn answer(behavior: &ContextBehavior, host: &WorkerHost, reply: ReplySender) {
    let junk = Bytes::from_static(&[0xff, 0x00]);
    // Send failures mean the prober stopped listening, which is allowed.
    match behavior {
        ContextBehavior::Reply(message) => {
            let _ = reply.post(&host.report(message).await);
        }
        ContextBehavior::ReplyThenJunk(message) => {
            let _ = reply.post(&host.report(message).await);
            let _ = reply.post_raw(junk.clone());
            let _ = reply.post_raw(junk);
        }
        ContextBehavior::Garbage => {
            let _ = reply.post_raw(junk);
        }
        ContextBehavior::Closes | ContextBehavior::Unsupported | ContextBehavior::FailsToStart => {
            drop(reply);
        }
    }
}

async fn run_worker(
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    behavior: ContextBehavior,
    host: Arc<WorkerHost>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            WorkerRequest::CompatibilityCheck { reply, .. } => {
                answer(&behavior, &host, reply).await
            }
            WorkerRequest::Serve(request) => {
                tokio::spawn(host_database(host.clone(), request));
            }
        }
    }
}

/// A fake background context. Implements both context traits.
pub struct FakeContext {
    tx: mpsc::UnboundedSender<WorkerRequest>,
    task: JoinHandle<()>,
    stats: Arc<ContextStats>,
}

impl FakeContext {
    fn spawn(behavior: ContextBehavior, host: Arc<WorkerHost>) -> (Self, Arc<ContextStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ContextStats::default());
        let task = tokio::spawn(run_worker(rx, behavior, host));
        (
            Self {
                tx,
                task,
                stats: stats.clone(),
            },
            stats,
        )
    }

    fn deliver(&self, request: WorkerRequest) -> dbprobe_channel::Result<()> {
        if self.stats.is_disposed() {
            return Err(ChannelError::PostFailed("context disposed".into()));
        }
        match &request {
            WorkerRequest::CompatibilityCheck { .. } => self.stats.checks.fetch_add(1, Ordering::SeqCst),
            WorkerRequest::Serve(_) => self.stats.serves.fetch_add(1, Ordering::SeqCst),
        };
        self.tx.send(request).map_err(|_| ChannelError::Closed)
    }

    fn dispose(&self) {
        self.stats.disposed.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

impl DedicatedContext for FakeContext {
    fn post(&self, request: WorkerRequest) -> dbprobe_channel::Result<()> {
        self.deliver(request)
    }

    fn terminate(&self) {
        self.dispose();
    }
}

impl SharedContext for FakeContext {
    fn post(&self, request: WorkerRequest) -> dbprobe_channel::Result<()> {
        self.deliver(request)
    }

    fn close(&self) {
        self.dispose();
    }
}

/// An in-process [`Environment`] whose contexts are [`FakeContext`]s.
pub struct FakeEnvironment {
    dedicated: ContextBehavior,
    shared: ContextBehavior,
    host: Arc<WorkerHost>,
    local: Arc<MemoryKeyValueStore>,
    hub: Option<Arc<UpdateHub>>,
    dedicated_stats: Mutex<Vec<Arc<ContextStats>>>,
    shared_stats: Mutex<Vec<Arc<ContextStats>>>,
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEnvironment {
    /// An environment with no background contexts and an update hub.
    pub fn new() -> Self {
        Self {
            dedicated: ContextBehavior::Unsupported,
            shared: ContextBehavior::Unsupported,
            host: Arc::new(WorkerHost::default()),
            local: Arc::new(MemoryKeyValueStore::new()),
            hub: Some(Arc::new(UpdateHub::new())),
            dedicated_stats: Mutex::new(Vec::new()),
            shared_stats: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dedicated(mut self, behavior: ContextBehavior) -> Self {
        self.dedicated = behavior;
        self
    }

    pub fn with_shared(mut self, behavior: ContextBehavior) -> Self {
        self.shared = behavior;
        self
    }

    pub fn without_update_hub(mut self) -> Self {
        self.hub = None;
        self
    }

    /// Stats of every dedicated context spawned so far.
    pub fn dedicated_contexts(&self) -> Vec<Arc<ContextStats>> {
        self.dedicated_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stats of every shared context connected so far.
    pub fn shared_contexts(&self) -> Vec<Arc<ContextStats>> {
        self.shared_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests posted to any context.
    pub fn total_posts(&self) -> usize {
        self.dedicated_contexts()
            .iter()
            .chain(self.shared_contexts().iter())
            .map(|stats| stats.posts())
            .sum()
    }

    /// The durable store background contexts write to.
    pub fn durable_store(&self) -> Arc<MemoryKeyValueStore> {
        self.host.durable.clone()
    }

    /// The key/value store background contexts write to.
    pub fn key_value_store(&self) -> Arc<MemoryKeyValueStore> {
        self.host.key_value.clone()
    }

    /// The key/value store used for local hosting.
    pub fn local_store(&self) -> Arc<MemoryKeyValueStore> {
        self.local.clone()
    }

    /// How often a background context asked the caller for initial bytes.
    pub fn init_requests(&self) -> usize {
        self.host.init_requests.load(Ordering::SeqCst)
    }

    fn start(
        &self,
        behavior: &ContextBehavior,
        stats: &Mutex<Vec<Arc<ContextStats>>>,
    ) -> dbprobe_channel::Result<FakeContext> {
        if matches!(behavior, ContextBehavior::FailsToStart) {
            return Err(ChannelError::PostFailed("constructor threw".into()));
        }
        let (context, context_stats) = FakeContext::spawn(behavior.clone(), self.host.clone());
        stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context_stats);
        Ok(context)
    }
}

#[async_trait]
impl Environment for FakeEnvironment {
    fn supports_dedicated(&self) -> bool {
        self.dedicated.is_supported()
    }

    fn spawn_dedicated(&self, _worker_uri: &str) -> dbprobe_channel::Result<Box<dyn DedicatedContext>> {
        let context = self.start(&self.dedicated, &self.dedicated_stats)?;
        Ok(Box::new(context))
    }

    fn supports_shared(&self) -> bool {
        self.shared.is_supported()
    }

    fn connect_shared(
        &self,
        _worker_uri: &str,
        _name: &str,
    ) -> dbprobe_channel::Result<Box<dyn SharedContext>> {
        let context = self.start(&self.shared, &self.shared_stats)?;
        Ok(Box::new(context))
    }

    async fn open_local_key_value(&self) -> dbprobe_store::Result<Arc<dyn KeyValueStore>> {
        Ok(self.local.clone())
    }

    fn update_hub(&self) -> Option<Arc<UpdateHub>> {
        self.hub.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbprobe_channel::reply_channel;
    use dbprobe_core::{decode_reply, CompatibilityCheck};

    #[tokio::test]
    async fn test_fake_context_answers_check() {
        let env = FakeEnvironment::new().with_dedicated(ContextBehavior::Reply(dedicated_result(
            true, true, true, false,
        )));
        let context = env.spawn_dedicated("worker.js").unwrap();

        let (reply, mut replies) = reply_channel();
        context
            .post(WorkerRequest::CompatibilityCheck {
                check: CompatibilityCheck::default(),
                reply,
            })
            .unwrap();

        let payload = replies.next().await.unwrap();
        assert_eq!(
            decode_reply(&payload).unwrap(),
            dedicated_result(true, true, true, false)
        );
        assert_eq!(env.dedicated_contexts()[0].checks(), 1);
    }

    #[tokio::test]
    async fn test_reply_lists_reachable_databases() {
        let env = FakeEnvironment::new().with_shared(ContextBehavior::Reply(shared_result(
            true, false, true,
        )));
        env.key_value_store()
            .put("notes/database", Bytes::from_static(b"db"))
            .await
            .unwrap();
        env.durable_store()
            .put("hidden/database", Bytes::from_static(b"db"))
            .await
            .unwrap();
        let context = env.connect_shared("worker.js", "shared").unwrap();

        let (reply, mut replies) = reply_channel();
        context
            .post(WorkerRequest::CompatibilityCheck {
                check: CompatibilityCheck::default(),
                reply,
            })
            .unwrap();

        let payload = replies.next().await.unwrap();
        let CompatibilityReply::SharedResult(result) = decode_reply(&payload).unwrap() else {
            panic!("expected a shared result");
        };
        assert_eq!(
            result.existing_databases,
            [ExistingDatabase::new(DatabaseLocation::KeyValue, "notes")].into()
        );
    }

    #[tokio::test]
    async fn test_disposed_context_rejects_posts() {
        let env = FakeEnvironment::new().with_shared(ContextBehavior::Closes);
        let context = env.connect_shared("worker.js", "shared").unwrap();
        context.close();

        let (reply, _replies) = reply_channel();
        let err = context
            .post(WorkerRequest::CompatibilityCheck {
                check: CompatibilityCheck::default(),
                reply,
            })
            .unwrap_err();
        assert!(matches!(err, ChannelError::PostFailed(_)));
        assert!(env.shared_contexts()[0].is_disposed());
        assert_eq!(env.total_posts(), 0);
    }

    #[tokio::test]
    async fn test_failing_constructor() {
        let env = FakeEnvironment::new().with_dedicated(ContextBehavior::FailsToStart);
        assert!(env.supports_dedicated());
        assert!(env.spawn_dedicated("worker.js").is_err());
        assert!(env.dedicated_contexts().is_empty());
    }
}
