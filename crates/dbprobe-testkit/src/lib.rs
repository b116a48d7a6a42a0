//! # dbprobe testkit
//!
//! Testing utilities for dbprobe.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-process [`FakeEnvironment`] whose background
//!   contexts speak the real protocol and host real SQLite databases
//! - **Generators**: Proptest strategies for compatibility replies
//! - **Scenarios**: Known context behaviors with the probe outcome they must
//!   produce
//!
//! ## Scenarios
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbprobe::{probe, ProbeConfig};
//! use dbprobe_testkit::all_scenarios;
//!
//! async fn example() {
//!     for scenario in all_scenarios() {
//!         let env = Arc::new(scenario.environment());
//!         let result = probe(env, ProbeConfig::default()).await;
//!         assert_eq!(result.available_backends(), scenario.expected_backends);
//!     }
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use dbprobe::backends_from_dedicated;
//! use dbprobe_testkit::generators::dedicated_compatibility;
//!
//! proptest! {
//!     #[test]
//!     fn decision_is_pure(reply in dedicated_compatibility()) {
//!         prop_assert_eq!(backends_from_dedicated(&reply), backends_from_dedicated(&reply));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    dedicated_result, shared_result, ContextBehavior, ContextStats, FakeContext, FakeEnvironment,
};
pub use generators::{database_name, dedicated_compatibility, shared_compatibility};
pub use vectors::{all_scenarios, Scenario};
