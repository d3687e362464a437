//! Identifier types.
//!
//! Participant and session ids are allocated by the coordinator from
//! monotonically increasing counters and are never reused within a process
//! lifetime. Both serialize as bare JSON numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-level connection identifier, assigned by the runtime.
pub type ConnectionId = u64;

/// Identifier of a registered participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

/// Identifier of a two-participant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}
