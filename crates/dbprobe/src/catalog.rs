//! Backend catalog: which backends the probe proved viable.
//!
//! Each reply is translated on its own by a pure decision table
//! ([`backends_from_dedicated`], [`backends_from_shared`]). Contributions are
//! only ever unioned, so the catalog does not depend on which reply arrived
//! first.

use std::collections::BTreeSet;

use dbprobe_core::{
    CompatibilityReport, DatabaseLocation, DedicatedCompatibility, ExistingDatabase,
    MissingFeature, SharedCompatibility, StorageBackend,
};

/// Backends a dedicated context's reply makes viable.
pub fn backends_from_dedicated(reply: &DedicatedCompatibility) -> BTreeSet<StorageBackend> {
    let mut backends = BTreeSet::new();
    if reply.supports_nested_workers
        && reply.can_access_durable_store
        && reply.supports_shared_memory_locks
    {
        backends.insert(StorageBackend::DedicatedDurableStore);
    }
    if reply.supports_key_value_store {
        backends.insert(StorageBackend::DedicatedKeyValueUnsafe);
    }
    backends
}

/// Backends a shared context's reply makes viable.
pub fn backends_from_shared(reply: &SharedCompatibility) -> BTreeSet<StorageBackend> {
    let mut backends = BTreeSet::new();
    if reply.can_spawn_dedicated && reply.dedicated_can_access_durable_store {
        backends.insert(StorageBackend::SharedDurableStore);
    }
    if reply.can_use_key_value_store {
        backends.insert(StorageBackend::SharedKeyValue);
    }
    backends
}

/// Accumulated probe outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCatalog {
    shared: BTreeSet<StorageBackend>,
    dedicated: BTreeSet<StorageBackend>,
    existing: BTreeSet<ExistingDatabase>,
    missing: BTreeSet<MissingFeature>,
}

impl BackendCatalog {
    /// An empty catalog. Only [`StorageBackend::InMemory`] is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a missing feature.
    pub fn record_missing(&mut self, feature: MissingFeature) {
        self.missing.insert(feature);
    }

    /// Fold in a dedicated context's reply.
    pub fn add_dedicated(&mut self, reply: &DedicatedCompatibility, name_hint: &str) {
        self.dedicated.extend(backends_from_dedicated(reply));
        self.absorb_report(reply, name_hint);
    }

    /// Fold in a shared context's reply.
    pub fn add_shared(&mut self, reply: &SharedCompatibility, name_hint: &str) {
        self.shared.extend(backends_from_shared(reply));
        self.absorb_report(reply, name_hint);
    }

    fn absorb_report(&mut self, report: &impl CompatibilityReport, name_hint: &str) {
        self.missing.extend(report.missing_features().iter().copied());
        self.existing.extend(report.existing_databases(name_hint));
    }

    /// Union of two catalogs.
    pub fn merge(mut self, other: Self) -> Self {
        self.shared.extend(other.shared);
        self.dedicated.extend(other.dedicated);
        self.existing.extend(other.existing);
        self.missing.extend(other.missing);
        self
    }

    /// Viable backends: in-memory first, then the shared contribution, then
    /// the dedicated one. No duplicates.
    pub fn backends(&self) -> Vec<StorageBackend> {
        let mut backends = vec![StorageBackend::InMemory];
        for backend in self.shared.iter().chain(&self.dedicated) {
            if !backends.contains(backend) {
                backends.push(*backend);
            }
        }
        backends
    }

    /// Whether `backend` is viable.
    pub fn contains(&self, backend: StorageBackend) -> bool {
        backend == StorageBackend::InMemory
            || self.shared.contains(&backend)
            || self.dedicated.contains(&backend)
    }

    pub fn existing_databases(&self) -> &BTreeSet<ExistingDatabase> {
        &self.existing
    }

    pub fn missing_features(&self) -> &BTreeSet<MissingFeature> {
        &self.missing
    }

    /// Whether a database called `name` was seen at `location`.
    pub fn database_exists(&self, location: DatabaseLocation, name: &str) -> bool {
        self.existing.contains(&ExistingDatabase::new(location, name))
    }

    /// The strongest viable backend whose location already holds `name`,
    /// otherwise the strongest viable backend.
    pub fn preferred_backend(&self, name: &str) -> StorageBackend {
        let backends = self.backends();
        let holding = backends
            .iter()
            .copied()
            .filter(|backend| {
                backend
                    .location()
                    .is_some_and(|location| self.database_exists(location, name))
            })
            .min();

        holding
            .or_else(|| backends.iter().copied().min())
            .unwrap_or(StorageBackend::InMemory)
    }
}
