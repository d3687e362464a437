//! Snapshot extraction for invariant checking.
//!
//! Captures the coordinator-visible state of a [`ServerDriver`] in a plain,
//! comparable form so invariants can be checked and two points in time can be
//! compared for equality.

use std::collections::BTreeMap;

use tandem_core::{env::Environment, rules::RuleModule};
use tandem_proto::{ConnectionId, ParticipantId, SessionId};
use tandem_server::{ParticipantStatus, ServerDriver};

/// One registered participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSnapshot {
    /// Participant id
    pub id: ParticipantId,
    /// Registered display name
    pub display_name: String,
    /// Lifecycle status
    pub status: ParticipantStatus,
    /// Owning connection
    pub connection_id: ConnectionId,
}

/// One live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session id
    pub id: SessionId,
    /// Members in seat order
    pub participants: [ParticipantId; 2],
    /// Seat of the current actor
    pub actor_index: usize,
    /// Actions left this turn
    pub turn_budget: u32,
    /// Categories filled per seat
    pub filled: [usize; 2],
    /// Round state as broadcast
    pub round_state: serde_json::Value,
}

/// Observable coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemSnapshot {
    /// Registered participants in id order
    pub participants: Vec<ParticipantSnapshot>,
    /// Waiting pool in insertion order
    pub pool: Vec<ParticipantId>,
    /// Live sessions in id order
    pub sessions: Vec<SessionSnapshot>,
    /// Participant → session index, sorted by participant
    pub session_index: Vec<(ParticipantId, SessionId)>,
    /// Per-turn allowance of the rule module
    pub turn_allowance: u32,
    /// Number of scoring categories
    pub category_count: usize,
    /// Live connections
    pub connections: usize,
}

impl SystemSnapshot {
    /// Extract a snapshot from a driver.
    pub fn from_driver<E, R>(driver: &ServerDriver<E, R>) -> Self
    where
        E: Environment,
        R: RuleModule,
    {
        let participants = driver
            .registry()
            .iter()
            .map(|p| ParticipantSnapshot {
                id: p.id,
                display_name: p.display_name.clone(),
                status: p.status,
                connection_id: p.connection_id,
            })
            .collect();

        let sessions = driver
            .sessions()
            .iter()
            .map(|s| SessionSnapshot {
                id: s.id(),
                participants: s.participants(),
                actor_index: s.actor_index(),
                turn_budget: s.turn_budget(),
                filled: [0, 1].map(|seat| s.results(seat).map_or(0, BTreeMap::len)),
                round_state: serde_json::to_value(s.round_state())
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        let mut session_index: Vec<_> = driver.sessions().index().collect();
        session_index.sort_unstable();

        Self {
            participants,
            pool: driver.pool().iter().collect(),
            sessions,
            session_index,
            turn_allowance: driver.rules().turn_allowance(),
            category_count: driver.rules().categories().len(),
            connections: driver.connection_count(),
        }
    }

    /// Participant by id.
    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantSnapshot> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Session by id.
    pub fn session(&self, id: SessionId) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| s.id == id)
    }
}
