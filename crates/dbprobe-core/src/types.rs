//! Strong type definitions for dbprobe.
//!
//! Backends, storage locations, and diagnostic flags are closed enums so the
//! decision logic can match on them exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete strategy for persisting a database.
///
/// Variants are declared from strongest to weakest guarantee, so the derived
/// `Ord` sorts the strongest backend first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// File-system-like durable store with locking, hosted in a shared context.
    SharedDurableStore,
    /// The same durable store reached through a dedicated context that
    /// coordinates through shared-memory locks.
    DedicatedDurableStore,
    /// Durable key/value store hosted in a shared context.
    SharedKeyValue,
    /// Durable key/value store hosted in a dedicated context. Not safe for
    /// concurrent access from several tabs.
    DedicatedKeyValueUnsafe,
    /// Non-durable fallback. Always available.
    InMemory,
}

/// Where a backend expects to be hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hosting {
    /// Served by the shared context.
    Shared,
    /// Served by the dedicated context.
    Dedicated,
    /// Served in the caller's own context.
    Local,
}

impl StorageBackend {
    /// All variants, strongest first.
    pub const ALL: [StorageBackend; 5] = [
        StorageBackend::SharedDurableStore,
        StorageBackend::DedicatedDurableStore,
        StorageBackend::SharedKeyValue,
        StorageBackend::DedicatedKeyValueUnsafe,
        StorageBackend::InMemory,
    ];

    /// The persistent storage family this backend writes to.
    ///
    /// `None` for the in-memory backend.
    pub const fn location(self) -> Option<DatabaseLocation> {
        match self {
            StorageBackend::SharedDurableStore | StorageBackend::DedicatedDurableStore => {
                Some(DatabaseLocation::DurableStore)
            }
            StorageBackend::SharedKeyValue | StorageBackend::DedicatedKeyValueUnsafe => {
                Some(DatabaseLocation::KeyValue)
            }
            StorageBackend::InMemory => None,
        }
    }

    /// Which execution context is expected to host this backend.
    pub const fn hosting(self) -> Hosting {
        match self {
            StorageBackend::SharedDurableStore | StorageBackend::SharedKeyValue => Hosting::Shared,
            StorageBackend::DedicatedDurableStore | StorageBackend::DedicatedKeyValueUnsafe => {
                Hosting::Dedicated
            }
            StorageBackend::InMemory => Hosting::Local,
        }
    }

    /// Whether writes made through one connection should be pushed to other
    /// same-process connections of the same database name.
    ///
    /// Only true for [`StorageBackend::DedicatedDurableStore`].
    pub const fn broadcasts_writes(self) -> bool {
        matches!(self, StorageBackend::DedicatedDurableStore)
    }

    /// Whether this backend survives a reload.
    pub const fn is_durable(self) -> bool {
        !matches!(self, StorageBackend::InMemory)
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::SharedDurableStore => "shared-durable-store",
            StorageBackend::DedicatedDurableStore => "dedicated-durable-store",
            StorageBackend::SharedKeyValue => "shared-key-value",
            StorageBackend::DedicatedKeyValueUnsafe => "dedicated-key-value-unsafe",
            StorageBackend::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

/// The two persistent storage families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseLocation {
    /// File-system-like store.
    DurableStore,
    /// Key/value store.
    KeyValue,
}

/// A database discovered during probing, identified by location and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExistingDatabase {
    pub location: DatabaseLocation,
    pub name: String,
}

impl ExistingDatabase {
    /// Create a new entry.
    pub fn new(location: DatabaseLocation, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }
}

/// A runtime primitive found missing while probing. Purely diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFeature {
    /// Dedicated contexts cannot be constructed or did not answer the probe.
    DedicatedContexts,
    /// Shared contexts cannot be constructed or did not answer the probe.
    SharedContexts,
    /// Background contexts cannot spawn further dedicated contexts.
    NestedDedicatedContexts,
    /// The file-system-like durable store is unreachable.
    DurableStore,
    /// Shared-memory lock primitives are unavailable.
    SharedMemoryLocks,
    /// The durable key/value store is unreachable.
    KeyValueStore,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_backend_order_is_strength() {
        let mut shuffled = vec![
            StorageBackend::InMemory,
            StorageBackend::SharedKeyValue,
            StorageBackend::SharedDurableStore,
            StorageBackend::DedicatedKeyValueUnsafe,
            StorageBackend::DedicatedDurableStore,
        ];
        shuffled.sort();
        assert_eq!(shuffled, StorageBackend::ALL.to_vec());
    }

    #[test]
    fn test_backend_locations() {
        assert_eq!(
            StorageBackend::DedicatedDurableStore.location(),
            Some(DatabaseLocation::DurableStore)
        );
        assert_eq!(
            StorageBackend::SharedKeyValue.location(),
            Some(DatabaseLocation::KeyValue)
        );
        assert_eq!(StorageBackend::InMemory.location(), None);
    }

    #[test]
    fn test_only_dedicated_durable_store_broadcasts() {
        let broadcasting: Vec<_> = StorageBackend::ALL
            .into_iter()
            .filter(|b| b.broadcasts_writes())
            .collect();
        assert_eq!(broadcasting, vec![StorageBackend::DedicatedDurableStore]);
    }

    proptest! {
        #[test]
        fn prop_durable_backends_have_a_location(backend in prop::sample::select(StorageBackend::ALL.to_vec())) {
            prop_assert_eq!(backend.is_durable(), backend.location().is_some());
            prop_assert_eq!(backend.is_durable(), backend.hosting() != Hosting::Local);
        }

        #[test]
        fn prop_display_matches_serde_name(backend in prop::sample::select(StorageBackend::ALL.to_vec())) {
            let json = serde_json::to_string(&backend).unwrap();
            prop_assert_eq!(json, format!("\"{backend}\""));
        }
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(
            StorageBackend::DedicatedKeyValueUnsafe.to_string(),
            "dedicated-key-value-unsafe"
        );
    }
}
