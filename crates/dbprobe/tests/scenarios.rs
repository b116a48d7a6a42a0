//! End-to-end probe and open scenarios against the in-process fake
//! environment.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use dbprobe::store::KeyValueStore;
use dbprobe::{
    initializer, open_database, probe, DatabaseError, DatabaseLocation, ExistingDatabase,
    Initializer, ProbeConfig, SqlValue, StorageBackend,
};
use dbprobe_testkit::{
    all_scenarios, dedicated_result, shared_result, ContextBehavior, FakeEnvironment,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A SQLite file holding one greeting.
fn seed_database() -> Bytes {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seed.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE greetings (text TEXT);
         INSERT INTO greetings VALUES ('hello');",
    )
    .unwrap();
    drop(conn);
    Bytes::from(std::fs::read(&path).unwrap())
}

fn counting(calls: Arc<AtomicUsize>, bytes: Option<Bytes>) -> Initializer {
    initializer(move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>(bytes)
    })
}

fn dedicated_env() -> FakeEnvironment {
    FakeEnvironment::new()
        .with_dedicated(ContextBehavior::Reply(dedicated_result(true, true, true, true)))
        .with_shared(ContextBehavior::Reply(shared_result(false, false, false)))
}

fn shared_env() -> FakeEnvironment {
    FakeEnvironment::new()
        .with_dedicated(ContextBehavior::Reply(dedicated_result(true, true, true, true)))
        .with_shared(ContextBehavior::Reply(shared_result(true, true, true)))
}

async fn greeting(conn: &dbprobe::Connection) -> Option<String> {
    let rows = conn.select("SELECT text FROM greetings", &[]).await.unwrap();
    rows.get(0, "text")
        .and_then(SqlValue::as_text)
        .map(str::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Probing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_scenarios() {
    init_tracing();

    for scenario in all_scenarios() {
        let env = Arc::new(scenario.environment());
        let result = probe(env.clone(), ProbeConfig::default()).await;

        assert_eq!(
            result.available_backends(),
            scenario.expected_backends,
            "{}",
            scenario.name
        );
        assert_eq!(
            result.missing_features(),
            &scenario.expected_missing,
            "{}",
            scenario.name
        );
        assert_eq!(result.handles().has_dedicated(), scenario.keeps_dedicated, "{}", scenario.name);
        assert_eq!(result.handles().has_shared(), scenario.keeps_shared, "{}", scenario.name);

        // Each context is asked exactly once; failed ones are torn down.
        for stats in env.dedicated_contexts() {
            assert_eq!(stats.checks(), 1, "{}", scenario.name);
            assert_eq!(stats.is_disposed(), !scenario.keeps_dedicated, "{}", scenario.name);
        }
        for stats in env.shared_contexts() {
            assert_eq!(stats.checks(), 1, "{}", scenario.name);
            assert_eq!(stats.is_disposed(), !scenario.keeps_shared, "{}", scenario.name);
        }

        result.dispose();
    }
}

#[tokio::test]
async fn test_name_hint_reaches_legacy_flags() {
    let reply = dbprobe::core::SharedCompatibility {
        can_use_key_value_store: true,
        legacy_kv_exists: true,
        ..Default::default()
    };

    let env = Arc::new(FakeEnvironment::new().with_shared(ContextBehavior::Reply(
        dbprobe::core::CompatibilityReply::SharedResult(reply),
    )));
    let config = ProbeConfig::default().with_database_name_hint("notes");
    let result = probe(env, config).await;

    assert!(result
        .catalog()
        .database_exists(DatabaseLocation::KeyValue, "notes"));
    assert_eq!(result.preferred_backend("notes"), StorageBackend::SharedKeyValue);
}

#[tokio::test]
async fn test_existing_database_steers_preferred_backend() {
    let env = Arc::new(
        FakeEnvironment::new()
            .with_dedicated(ContextBehavior::Reply(dedicated_result(true, true, true, true)))
            .with_shared(ContextBehavior::Reply(shared_result(false, false, true))),
    );

    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::SharedKeyValue, "notes", None)
        .await
        .unwrap();
    conn.execute_batch("CREATE TABLE greetings (text TEXT); INSERT INTO greetings VALUES ('stored');")
        .await
        .unwrap();
    conn.close().await.unwrap();

    let result = probe(env.clone(), ProbeConfig::default()).await;
    assert!(result
        .existing_databases()
        .contains(&ExistingDatabase::new(DatabaseLocation::KeyValue, "notes")));
    assert_eq!(result.preferred_backend("notes"), StorageBackend::SharedKeyValue);
    assert_eq!(result.preferred_backend("fresh"), StorageBackend::DedicatedDurableStore);

    let conn = result
        .open(StorageBackend::SharedKeyValue, "notes", None)
        .await
        .unwrap();
    assert_eq!(greeting(&conn).await.as_deref(), Some("stored"));
}

#[tokio::test]
async fn test_delete_is_unsupported() {
    let env = Arc::new(dedicated_env());
    let result = probe(env.clone(), ProbeConfig::default()).await;
    let backends = result.available_backends();

    let err = result
        .delete_database(DatabaseLocation::DurableStore, "notes")
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Unsupported(_)));

    // Nothing changed.
    assert_eq!(result.available_backends(), backends);
    assert!(result.handles().has_dedicated());
    assert!(result.handles().has_shared());
    assert_eq!(env.total_posts(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_in_memory_never_touches_workers() {
    let env = Arc::new(shared_env());
    let result = probe(env.clone(), ProbeConfig::default()).await;
    let posts_after_probe = env.total_posts();

    let conn = result
        .open(StorageBackend::InMemory, "scratch", None)
        .await
        .unwrap();
    conn.execute_batch("CREATE TABLE t (x)").await.unwrap();

    assert!(!conn.is_remote());
    assert!(!conn.has_updates());
    assert_eq!(env.total_posts(), posts_after_probe);
    for stats in env.dedicated_contexts().iter().chain(&env.shared_contexts()) {
        assert!(stats.is_disposed());
    }
}

#[tokio::test]
async fn test_in_memory_is_not_durable() {
    let env = Arc::new(FakeEnvironment::new());

    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::InMemory, "scratch", None)
        .await
        .unwrap();
    conn.execute_batch("CREATE TABLE t (x); INSERT INTO t VALUES (1);")
        .await
        .unwrap();
    conn.close().await.unwrap();

    let reopened = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::InMemory, "scratch", None)
        .await
        .unwrap();
    assert!(reopened.select("SELECT x FROM t", &[]).await.is_err());

    assert!(env.local_store().keys().await.unwrap().is_empty());
    assert!(env.durable_store().keys().await.unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_initializer_runs_once_for_new_database() {
    init_tracing();
    let env = Arc::new(dedicated_env());
    let calls = Arc::new(AtomicUsize::new(0));

    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedDurableStore,
            "seeded",
            Some(counting(calls.clone(), Some(seed_database()))),
        )
        .await
        .unwrap();

    assert!(conn.is_remote());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(env.init_requests(), 1);
    assert_eq!(greeting(&conn).await.as_deref(), Some("hello"));
    assert!(env.durable_store().get("seeded/database").await.unwrap().is_some());
}

#[tokio::test]
async fn test_remote_initializer_skipped_for_existing_database() {
    let env = Arc::new(dedicated_env());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "notes", None)
        .await
        .unwrap();
    first
        .execute_batch("CREATE TABLE greetings (text TEXT); INSERT INTO greetings VALUES ('kept');")
        .await
        .unwrap();
    first.close().await.unwrap();

    let second = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedDurableStore,
            "notes",
            Some(counting(calls.clone(), Some(seed_database()))),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(env.init_requests(), 0);
    assert_eq!(greeting(&second).await.as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_local_initializer_runs_once_then_never() {
    let env = Arc::new(FakeEnvironment::new());
    let calls = Arc::new(AtomicUsize::new(0));

    // No dedicated context survived, so this is hosted locally.
    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedKeyValueUnsafe,
            "local",
            Some(counting(calls.clone(), Some(seed_database()))),
        )
        .await
        .unwrap();
    assert!(!conn.is_remote());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(greeting(&conn).await.as_deref(), Some("hello"));
    conn.close().await.unwrap();

    let again = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedKeyValueUnsafe,
            "local",
            Some(counting(calls.clone(), None)),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(greeting(&again).await.as_deref(), Some("hello"));
    assert!(env.local_store().get("local/database").await.unwrap().is_some());
}

#[tokio::test]
async fn test_in_memory_initializer_seeds_database() {
    let env = Arc::new(FakeEnvironment::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let conn = probe(env, ProbeConfig::default())
        .await
        .open(
            StorageBackend::InMemory,
            "seeded",
            Some(counting(calls.clone(), Some(seed_database()))),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(greeting(&conn).await.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_initializer_absence_creates_empty_database() {
    let env = Arc::new(dedicated_env());
    let calls = Arc::new(AtomicUsize::new(0));

    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedDurableStore,
            "empty",
            Some(counting(calls.clone(), None)),
        )
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let tables = conn
        .select("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
        .await
        .unwrap();
    assert!(tables.is_empty());
}

#[tokio::test]
async fn test_remote_initializer_failure_fails_open() {
    let env = Arc::new(dedicated_env());

    let err = probe(env.clone(), ProbeConfig::default())
        .await
        .open(
            StorageBackend::DedicatedDurableStore,
            "broken",
            Some(initializer(|| async {
                Err::<Option<Bytes>, _>(anyhow::anyhow!("seed unavailable"))
            })),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::Remote(_)), "{err:?}");
    let dedicated = &env.dedicated_contexts()[0];
    assert_eq!(dedicated.serves(), 1);
    assert!(dedicated.is_disposed());
}

#[tokio::test]
async fn test_local_initializer_failure_fails_open() {
    let env = Arc::new(FakeEnvironment::new());

    let err = probe(env, ProbeConfig::default())
        .await
        .open(
            StorageBackend::InMemory,
            "broken",
            Some(initializer(|| async {
                Err::<Option<Bytes>, _>(anyhow::anyhow!("seed unavailable"))
            })),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::Store(_)), "{err:?}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Hosting and updates
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dedicated_durable_store_broadcasts_writes() {
    let env = Arc::new(dedicated_env());

    let writer = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "shared-notes", None)
        .await
        .unwrap();
    let reader = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "shared-notes", None)
        .await
        .unwrap();
    let mut updates = reader.subscribe().unwrap();

    writer
        .execute_batch("CREATE TABLE greetings (text TEXT)")
        .await
        .unwrap();
    writer
        .execute(
            "INSERT INTO greetings VALUES (?1)",
            &[SqlValue::from("from writer")],
        )
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), updates.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.database, "shared-notes");
    assert_eq!(event.origin, writer.id());
    assert_eq!(greeting(&reader).await.as_deref(), Some("from writer"));
}

#[tokio::test]
async fn test_unsafe_key_value_does_not_broadcast() {
    let env = Arc::new(dedicated_env());

    let a = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedKeyValueUnsafe, "kv-notes", None)
        .await
        .unwrap();
    let b = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedKeyValueUnsafe, "kv-notes", None)
        .await
        .unwrap();

    assert!(a.is_remote());
    assert!(!a.has_updates());
    assert!(b.subscribe().is_none());
}

#[tokio::test]
async fn test_no_broadcast_without_hub_or_when_disabled() {
    let env = Arc::new(dedicated_env().without_update_hub());
    let conn = probe(env, ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "notes", None)
        .await
        .unwrap();
    assert!(!conn.has_updates());

    let env = Arc::new(dedicated_env());
    let config = ProbeConfig::default().with_stream_updates(false);
    let conn = probe(env, config)
        .await
        .open(StorageBackend::DedicatedDurableStore, "notes", None)
        .await
        .unwrap();
    assert!(!conn.has_updates());
}

#[tokio::test]
async fn test_shared_backend_terminates_dedicated() {
    let env = Arc::new(shared_env());
    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::SharedKeyValue, "notes", None)
        .await
        .unwrap();

    assert!(conn.is_remote());
    assert!(env.dedicated_contexts()[0].is_disposed());
    let shared = env.shared_contexts()[0].clone();
    assert!(!shared.is_disposed());
    assert_eq!(shared.serves(), 1);

    conn.execute_batch("CREATE TABLE t (x)").await.unwrap();
    assert!(env.key_value_store().get("notes/database").await.unwrap().is_some());

    conn.close().await.unwrap();
    assert!(shared.is_disposed());
}

#[tokio::test]
async fn test_dedicated_backend_closes_shared() {
    let env = Arc::new(shared_env());
    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "notes", None)
        .await
        .unwrap();

    assert!(conn.is_remote());
    assert!(env.shared_contexts()[0].is_disposed());
    assert_eq!(env.dedicated_contexts()[0].serves(), 1);
}

#[tokio::test]
async fn test_missing_context_falls_back_to_local() {
    let env = Arc::new(
        FakeEnvironment::new()
            .with_dedicated(ContextBehavior::Closes)
            .with_shared(ContextBehavior::Unsupported),
    );

    let conn = probe(env.clone(), ProbeConfig::default())
        .await
        .open(StorageBackend::DedicatedDurableStore, "fallback", None)
        .await
        .unwrap();
    conn.execute_batch("CREATE TABLE t (x)").await.unwrap();

    assert!(!conn.is_remote());
    assert_eq!(env.dedicated_contexts()[0].serves(), 0);
    assert!(env.local_store().get("fallback/database").await.unwrap().is_some());
}

#[tokio::test]
async fn test_local_setup_hook_runs() {
    let env = Arc::new(FakeEnvironment::new());
    let setup: dbprobe::store::LocalSetup = Arc::new(|conn: &rusqlite::Connection| {
        conn.pragma_update(None, "user_version", 7)
    });
    let config = ProbeConfig::default().with_local_setup(setup);

    let conn = probe(env, config)
        .await
        .open(StorageBackend::InMemory, "configured", None)
        .await
        .unwrap();
    let rows = conn.select("PRAGMA user_version", &[]).await.unwrap();
    assert_eq!(
        rows.get(0, "user_version").and_then(SqlValue::as_integer),
        Some(7)
    );
}

#[tokio::test]
async fn test_open_database_picks_preferred_backend() {
    let env = Arc::new(shared_env());
    let opened = open_database(env.clone(), ProbeConfig::default(), "notes", None)
        .await
        .unwrap();

    assert_eq!(opened.backend, StorageBackend::SharedDurableStore);
    assert_eq!(opened.connection.backend(), StorageBackend::SharedDurableStore);
    assert!(opened.missing_features.is_empty());

    let env = Arc::new(FakeEnvironment::new());
    let opened = open_database(env, ProbeConfig::default(), "notes", None)
        .await
        .unwrap();
    assert_eq!(opened.backend, StorageBackend::InMemory);
    assert_eq!(opened.missing_features.len(), 2);
}
