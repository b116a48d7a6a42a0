//! Probe scenarios with their expected outcomes.
//!
//! Each scenario fixes how the two background contexts behave and what the
//! probe must conclude from it.

use std::collections::BTreeSet;

use dbprobe_core::{
    CompatibilityReply, DedicatedCompatibility, MissingFeature, SharedCompatibility,
    StorageBackend,
};

use crate::fixtures::{dedicated_result, shared_result, ContextBehavior, FakeEnvironment};

/// A probe scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Human-readable name for the scenario.
    pub name: &'static str,
    /// Behavior of the dedicated context.
    pub dedicated: ContextBehavior,
    /// Behavior of the shared context.
    pub shared: ContextBehavior,
    /// Expected viable backends, in order.
    pub expected_backends: Vec<StorageBackend>,
    /// Expected missing features.
    pub expected_missing: BTreeSet<MissingFeature>,
    /// Whether the dedicated handle survives probing.
    pub keeps_dedicated: bool,
    /// Whether the shared handle survives probing.
    pub keeps_shared: bool,
}

impl Scenario {
    /// A fresh environment behaving as this scenario describes.
    pub fn environment(&self) -> FakeEnvironment {
        FakeEnvironment::new()
            .with_dedicated(self.dedicated.clone())
            .with_shared(self.shared.clone())
    }
}

use MissingFeature::*;
use StorageBackend::*;

/// Get all scenarios.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "dedicated with locks, shared cannot spawn",
            dedicated: ContextBehavior::Reply(dedicated_result(true, true, true, false)),
            shared: ContextBehavior::Reply(shared_result(false, false, false)),
            expected_backends: vec![InMemory, DedicatedDurableStore],
            expected_missing: BTreeSet::new(),
            keeps_dedicated: true,
            keeps_shared: true,
        },
        Scenario {
            name: "both probes fail outright",
            dedicated: ContextBehavior::error("no storage access"),
            shared: ContextBehavior::Closes,
            expected_backends: vec![InMemory],
            expected_missing: [DedicatedContexts, SharedContexts].into(),
            keeps_dedicated: false,
            keeps_shared: false,
        },
        Scenario {
            name: "no background contexts at all",
            dedicated: ContextBehavior::Unsupported,
            shared: ContextBehavior::Unsupported,
            expected_backends: vec![InMemory],
            expected_missing: [DedicatedContexts, SharedContexts].into(),
            keeps_dedicated: false,
            keeps_shared: false,
        },
        Scenario {
            name: "everything available",
            dedicated: ContextBehavior::Reply(dedicated_result(true, true, true, true)),
            shared: ContextBehavior::Reply(shared_result(true, true, true)),
            expected_backends: vec![
                InMemory,
                SharedDurableStore,
                SharedKeyValue,
                DedicatedDurableStore,
                DedicatedKeyValueUnsafe,
            ],
            expected_missing: BTreeSet::new(),
            keeps_dedicated: true,
            keeps_shared: true,
        },
        Scenario {
            name: "no nested contexts, key/value only",
            dedicated: ContextBehavior::Reply(CompatibilityReply::DedicatedResult(
                DedicatedCompatibility {
                    supports_nested_workers: false,
                    can_access_durable_store: true,
                    supports_shared_memory_locks: true,
                    supports_key_value_store: true,
                    missing_features: [NestedDedicatedContexts].into(),
                    ..Default::default()
                },
            )),
            shared: ContextBehavior::Unsupported,
            expected_backends: vec![InMemory, DedicatedKeyValueUnsafe],
            expected_missing: [NestedDedicatedContexts, SharedContexts].into(),
            keeps_dedicated: true,
            keeps_shared: false,
        },
        Scenario {
            name: "shared only, durable store through spawned contexts",
            dedicated: ContextBehavior::FailsToStart,
            shared: ContextBehavior::Reply(CompatibilityReply::SharedResult(SharedCompatibility {
                can_spawn_dedicated: true,
                dedicated_can_access_durable_store: true,
                can_use_key_value_store: false,
                missing_features: [KeyValueStore].into(),
                ..Default::default()
            })),
            expected_backends: vec![InMemory, SharedDurableStore],
            expected_missing: [DedicatedContexts, KeyValueStore].into(),
            keeps_dedicated: false,
            keeps_shared: true,
        },
        Scenario {
            name: "replies swapped between contexts",
            dedicated: ContextBehavior::Reply(shared_result(true, true, true)),
            shared: ContextBehavior::Reply(dedicated_result(true, true, true, true)),
            expected_backends: vec![InMemory],
            expected_missing: [DedicatedContexts, SharedContexts].into(),
            keeps_dedicated: false,
            keeps_shared: false,
        },
        Scenario {
            name: "undecodable dedicated reply",
            dedicated: ContextBehavior::Garbage,
            shared: ContextBehavior::Reply(shared_result(false, false, true)),
            expected_backends: vec![InMemory, SharedKeyValue],
            expected_missing: [DedicatedContexts].into(),
            keeps_dedicated: false,
            keeps_shared: true,
        },
        Scenario {
            name: "extra messages after the first reply",
            dedicated: ContextBehavior::ReplyThenJunk(dedicated_result(false, false, false, true)),
            shared: ContextBehavior::ReplyThenJunk(shared_result(false, false, false)),
            expected_backends: vec![InMemory, DedicatedKeyValueUnsafe],
            expected_missing: BTreeSet::new(),
            keeps_dedicated: true,
            keeps_shared: true,
        },
    ]
}
