//! Proptest generators for property-based testing.

use proptest::prelude::*;

use dbprobe_core::{
    DatabaseLocation, DedicatedCompatibility, ExistingDatabase, MissingFeature,
    SharedCompatibility,
};

/// Generate a DatabaseLocation.
fn database_location() -> impl Strategy<Value = DatabaseLocation> {
    prop_oneof![
        Just(DatabaseLocation::DurableStore),
        Just(DatabaseLocation::KeyValue),
    ]
}

/// Generate a MissingFeature.
fn missing_feature() -> impl Strategy<Value = MissingFeature> {
    prop_oneof![
        Just(MissingFeature::DedicatedContexts),
        Just(MissingFeature::SharedContexts),
        Just(MissingFeature::NestedDedicatedContexts),
        Just(MissingFeature::DurableStore),
        Just(MissingFeature::SharedMemoryLocks),
        Just(MissingFeature::KeyValueStore),
    ]
}

/// Generate a short database name.
pub fn database_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,7}"
}

/// Generate an ExistingDatabase.
fn existing_database() -> impl Strategy<Value = ExistingDatabase> {
    (database_location(), database_name()).prop_map(|(location, name)| ExistingDatabase {
        location,
        name,
    })
}

/// Generate a dedicated context's reply.
pub fn dedicated_compatibility() -> impl Strategy<Value = DedicatedCompatibility> {
    (
        any::<[bool; 6]>(),
        prop::collection::btree_set(missing_feature(), 0..4),
        prop::collection::btree_set(existing_database(), 0..4),
    )
        .prop_map(|(flags, missing_features, existing_databases)| DedicatedCompatibility {
            supports_nested_workers: flags[0],
            can_access_durable_store: flags[1],
            supports_shared_memory_locks: flags[2],
            supports_key_value_store: flags[3],
            legacy_store_exists: flags[4],
            legacy_kv_exists: flags[5],
            missing_features,
            existing_databases,
        })
}

/// Generate a shared context's reply.
pub fn shared_compatibility() -> impl Strategy<Value = SharedCompatibility> {
    (
        any::<[bool; 5]>(),
        prop::collection::btree_set(missing_feature(), 0..4),
        prop::collection::btree_set(existing_database(), 0..4),
    )
        .prop_map(|(flags, missing_features, existing_databases)| SharedCompatibility {
            can_spawn_dedicated: flags[0],
            dedicated_can_access_durable_store: flags[1],
            can_use_key_value_store: flags[2],
            legacy_store_exists: flags[3],
            legacy_kv_exists: flags[4],
            missing_features,
            existing_databases,
        })
}
