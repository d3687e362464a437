//! Fuzz target for coordinator state transitions
//!
//! Drives a simulation server with arbitrary client operations.
//!
//! # Strategy
//!
//! - Registration with valid, duplicate and invalid names
//! - Pool entry/exit and invitations to arbitrary targets
//! - In-turn and out-of-turn actions, commits with wrong claims
//! - Garbage frames, disconnects, reconnects, time jumps and ticks
//! - Both pairing policies, with a turn timeout
//!
//! # Invariants
//!
//! - Pool and sessions are disjoint; statuses agree with both
//! - Actor seat follows filled categories; budget within allowance
//! - Rejected requests leave observable state unchanged

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tandem_harness::{InvariantRegistry, Operation, OperationResult, SimWorld, SystemSnapshot};
use tandem_server::{DriverConfig, PairingPolicy};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    clients: u8,
    auto_pair: bool,
    ops: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let config = DriverConfig {
        pairing: if scenario.auto_pair { PairingPolicy::AutoPair } else { PairingPolicy::Invitation },
        turn_timeout: Some(Duration::from_secs(60)),
        ..DriverConfig::default()
    };
    let clients = usize::from(scenario.clients % 6) + 1;
    let mut world = SimWorld::with_config(clients, scenario.seed, config).expect("world must build");
    let registry = InvariantRegistry::standard();

    for op in scenario.ops.iter().take(256) {
        let before = SystemSnapshot::from_driver(world.server().driver());
        let result = world.apply(op).expect("driver must accept events for open connections");
        let after = SystemSnapshot::from_driver(world.server().driver());

        registry.assert_all(&after, &format!("after {op:?}"));
        if let OperationResult::Rejected(code) = result {
            assert_eq!(before, after, "{op:?} rejected with {code:?} but state changed");
        }
    }
});
