//! Error types for rule modules.

use thiserror::Error;

/// A rule module refused an action or could not score the current round.
///
/// Carries the module's reason verbatim; the coordinator forwards it to the
/// actor unchanged and leaves turn state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct RuleViolation {
    /// Human-readable reason
    pub reason: String,
}

impl RuleViolation {
    /// Create a violation with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}
