//! Coordinator invariants.
//!
//! Each check looks at a [`SystemSnapshot`] taken from a `ServerDriver` and
//! reports whether the pool, the sessions and the registry still agree with
//! one another. Property tests and fuzz targets take a snapshot after every
//! operation and run the full [`InvariantRegistry::standard`] set.
//!
//! ```ignore
//! let invariants = InvariantRegistry::standard();
//! invariants.assert_all(&SystemSnapshot::from_driver(server.driver()), "after invite");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    BudgetWithinAllowance, IndexConsistency, PoolSessionExclusion, SessionMembership,
    TurnAlternation,
};
pub use snapshot::{ParticipantSnapshot, SessionSnapshot, SystemSnapshot};

/// Outcome of one invariant check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Invariant that failed
    pub invariant: &'static str,
    /// What the snapshot contained
    pub message: String,
}

impl Violation {
    /// Violation of `invariant`.
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of coordinator state that holds between any two events.
pub trait Invariant: Send + Sync {
    /// Short snake_case name used in reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`, returning the first problem found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Set of invariants run together against each snapshot.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every coordinator invariant:
    ///
    /// - [`PoolSessionExclusion`]
    /// - [`SessionMembership`]
    /// - [`TurnAlternation`]
    /// - [`BudgetWithinAllowance`]
    /// - [`IndexConsistency`]
    pub fn standard() -> Self {
        Self::new()
            .with(PoolSessionExclusion)
            .with(SessionMembership)
            .with(TurnAlternation)
            .with(BudgetWithinAllowance)
            .with(IndexConsistency)
    }

    /// Builder form of [`InvariantRegistry::add`].
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, invariant: I) -> Self {
        self.add(invariant);
        self
    }

    /// Register one more check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every check, collecting all violations.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.checks.iter().filter_map(|check| check.check(state).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and panic listing all violations.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
            panic!("coordinator invariants broken {context}:\n  {}", report.join("\n  "));
        }
    }

    /// Names of the registered checks, in run order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no check is registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tandem_proto::ParticipantId;

    use super::*;

    #[test]
    fn standard_set_runs_every_check() {
        let invariants = InvariantRegistry::standard();

        assert_eq!(invariants.names(), vec![
            "pool_session_exclusion",
            "session_membership",
            "turn_alternation",
            "budget_within_allowance",
            "index_consistency",
        ]);
        assert!(InvariantRegistry::new().is_empty());
    }

    #[test]
    fn empty_coordinator_is_consistent() {
        assert!(InvariantRegistry::standard().check_all(&SystemSnapshot::default()).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let state =
            SystemSnapshot { pool: vec![ParticipantId(4)], ..SystemSnapshot::default() };

        let violations = InvariantRegistry::standard().check_all(&state).unwrap_err();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, "pool_session_exclusion");
        assert_eq!(
            violations[0].to_string(),
            "[pool_session_exclusion] p4 queued but not registered"
        );
    }
}
