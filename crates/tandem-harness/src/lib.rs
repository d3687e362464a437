//! Deterministic simulation harness for the Tandem coordinator.
//!
//! Virtual-time [`SimEnv`], an in-process [`SimServer`] around the Sans-IO
//! driver, and a scriptable [`TallyRules`] game for exact scenarios.
//!
//! # Model-Based Testing
//!
//! The `model` module generates client operations and applies them to a
//! [`SimWorld`], so properties can be checked after every step.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! coordinator invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod rules;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    BudgetWithinAllowance, IndexConsistency, Invariant, InvariantRegistry, InvariantResult,
    ParticipantSnapshot, PoolSessionExclusion, SessionMembership, SessionSnapshot, SystemSnapshot,
    TurnAlternation, Violation,
};
pub use model::{ClientId, NAMES, Operation, OperationResult, SimWorld};
pub use rules::{TallyAction, TallyRound, TallyRules};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::{SimError, SimServer};
