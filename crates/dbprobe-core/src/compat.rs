//! Compatibility-check messages exchanged with background contexts.
//!
//! A probe posts a [`CompatibilityCheck`] and reads back exactly one
//! [`CompatibilityReply`]. Replies cross the context boundary as encoded
//! payloads (see [`crate::codec`]); field names follow the camelCase wire
//! shape.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{DatabaseLocation, ExistingDatabase, MissingFeature};

/// Database name sent when the caller does not pick one.
pub const DEFAULT_NAME_HINT: &str = "dbprobe-compatibility-check";

/// Capability-check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityCheck {
    /// Name the legacy existence flags in the reply refer to.
    pub database_name_hint: String,
}

impl Default for CompatibilityCheck {
    fn default() -> Self {
        Self {
            database_name_hint: DEFAULT_NAME_HINT.to_string(),
        }
    }
}

/// One message received on a probe's reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CompatibilityReply {
    /// Reply from a dedicated context.
    DedicatedResult(DedicatedCompatibility),
    /// Reply from a shared context.
    SharedResult(SharedCompatibility),
    /// The context failed to run the check.
    Error(WorkerError),
}

/// Failure report from a background context. Carries no capability data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerError {
    pub detail: String,
}

/// Capabilities observed inside a dedicated context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedicatedCompatibility {
    /// The context can spawn nested background contexts.
    pub supports_nested_workers: bool,
    /// The file-system-like store is reachable.
    pub can_access_durable_store: bool,
    /// Shared-memory lock primitives are available.
    pub supports_shared_memory_locks: bool,
    /// A durable key/value store is reachable.
    pub supports_key_value_store: bool,
    #[serde(default)]
    pub missing_features: BTreeSet<MissingFeature>,
    #[serde(default)]
    pub existing_databases: BTreeSet<ExistingDatabase>,
    /// Legacy: the hinted database exists in the durable store.
    #[serde(default)]
    pub legacy_store_exists: bool,
    /// Legacy: the hinted database exists in the key/value store.
    #[serde(default)]
    pub legacy_kv_exists: bool,
}

/// Capabilities observed inside a shared context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCompatibility {
    /// The shared context can spawn dedicated contexts.
    pub can_spawn_dedicated: bool,
    /// Those dedicated contexts can reach the file-system-like store.
    pub dedicated_can_access_durable_store: bool,
    /// A durable key/value store is usable from the shared context.
    pub can_use_key_value_store: bool,
    #[serde(default)]
    pub missing_features: BTreeSet<MissingFeature>,
    #[serde(default)]
    pub existing_databases: BTreeSet<ExistingDatabase>,
    /// Legacy: the hinted database exists in the durable store.
    #[serde(default)]
    pub legacy_store_exists: bool,
    /// Legacy: the hinted database exists in the key/value store.
    #[serde(default)]
    pub legacy_kv_exists: bool,
}

/// Fields shared by both reply shapes.
pub trait CompatibilityReport {
    fn missing_features(&self) -> &BTreeSet<MissingFeature>;
    fn reported_databases(&self) -> &BTreeSet<ExistingDatabase>;
    fn legacy_store_exists(&self) -> bool;
    fn legacy_kv_exists(&self) -> bool;

    /// All databases this reply reports, with the legacy flags translated
    /// into `(location, name_hint)` entries.
    fn existing_databases(&self, name_hint: &str) -> BTreeSet<ExistingDatabase> {
        let mut found = self.reported_databases().clone();
        if self.legacy_store_exists() {
            found.insert(ExistingDatabase::new(DatabaseLocation::DurableStore, name_hint));
        }
        if self.legacy_kv_exists() {
            found.insert(ExistingDatabase::new(DatabaseLocation::KeyValue, name_hint));
        }
        found
    }
}

impl CompatibilityReport for DedicatedCompatibility {
    fn missing_features(&self) -> &BTreeSet<MissingFeature> {
        &self.missing_features
    }

    fn reported_databases(&self) -> &BTreeSet<ExistingDatabase> {
        &self.existing_databases
    }

    fn legacy_store_exists(&self) -> bool {
        self.legacy_store_exists
    }

    fn legacy_kv_exists(&self) -> bool {
        self.legacy_kv_exists
    }
}

impl CompatibilityReport for SharedCompatibility {
    fn missing_features(&self) -> &BTreeSet<MissingFeature> {
        &self.missing_features
    }

    fn reported_databases(&self) -> &BTreeSet<ExistingDatabase> {
        &self.existing_databases
    }

    fn legacy_store_exists(&self) -> bool {
        self.legacy_store_exists
    }

    fn legacy_kv_exists(&self) -> bool {
        self.legacy_kv_exists
    }
}
