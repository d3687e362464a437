//! Identity registry for participant tracking.
//!
//! The registry maintains bidirectional mappings: connection → participant
//! (for resolving the sender of every inbound message) and participant →
//! connection (for routing outbound messages). Display names are indexed so
//! uniqueness checks are O(1).
//!
//! Participants must register explicitly; a connection without a participant
//! may only send `register` or `join`. Removing a participant frees its name
//! immediately.

use std::collections::{BTreeMap, HashMap};

use tandem_proto::{ConnectionId, ParticipantId, ParticipantSummary, SessionId};
use thiserror::Error;

/// Lifecycle status of a registered participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Registered, neither queued nor in a session
    Idle,
    /// In the waiting pool
    Waiting,
    /// Member of the given session
    InSession(SessionId),
}

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Process-unique identifier
    pub id: ParticipantId,
    /// Trimmed display name, unique among registered participants
    pub display_name: String,
    /// Current lifecycle status
    pub status: ParticipantStatus,
    /// Connection that owns this participant
    pub connection_id: ConnectionId,
}

impl Participant {
    /// Public `{id, displayName}` view.
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary { id: self.id, display_name: self.display_name.clone() }
    }
}

/// Reasons a registration is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Connection already owns a participant
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// Name failed validation
    #[error("invalid display name: {0}")]
    InvalidName(String),

    /// Name held by another participant
    #[error("display name already taken: {0}")]
    NameTaken(String),
}

/// Registry of live participants.
///
/// Maintains bidirectional mappings for efficient lookups:
/// - Resolve a connection to its participant (every inbound message)
/// - Resolve a participant to its connection (every outbound message)
/// - Check name availability
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    /// Participant ID → record
    participants: BTreeMap<ParticipantId, Participant>,
    /// Display name → participant ID
    names: HashMap<String, ParticipantId>,
    /// Connection ID → participant ID (reverse index)
    by_connection: HashMap<ConnectionId, ParticipantId>,
    /// Next participant ID to hand out
    next_id: u64,
}

impl IdentityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    /// Register a participant for `connection_id`.
    ///
    /// The name is trimmed before validation and storage. Names must be
    /// non-empty, at most `max_name_len` characters, and free of control
    /// characters. Matching against existing names is case-sensitive.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        display_name: &str,
        max_name_len: usize,
    ) -> Result<&Participant, RegistrationError> {
        if self.by_connection.contains_key(&connection_id) {
            return Err(RegistrationError::AlreadyRegistered(connection_id));
        }

        let name = validate_name(display_name, max_name_len)?;
        if self.names.contains_key(&name) {
            return Err(RegistrationError::NameTaken(name));
        }

        let id = ParticipantId(self.next_id);
        self.next_id += 1;

        self.names.insert(name.clone(), id);
        self.by_connection.insert(connection_id, id);
        let participant = self.participants.entry(id).or_insert(Participant {
            id,
            display_name: name,
            status: ParticipantStatus::Idle,
            connection_id,
        });
        Ok(participant)
    }

    /// Remove a participant, freeing its name and connection mapping.
    ///
    /// Idempotent: returns `None` if it was already gone. Callers reclaim pool
    /// and session membership before removing.
    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        let participant = self.participants.remove(&id)?;
        self.names.remove(&participant.display_name);
        self.by_connection.remove(&participant.connection_id);
        Some(participant)
    }

    /// Participant record. `None` if not registered.
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Participant owned by a connection.
    pub fn participant_for_connection(&self, connection_id: ConnectionId) -> Option<ParticipantId> {
        self.by_connection.get(&connection_id).copied()
    }

    /// Connection owning a participant.
    pub fn connection_for(&self, id: ParticipantId) -> Option<ConnectionId> {
        self.participants.get(&id).map(|p| p.connection_id)
    }

    /// Current status. `None` if not registered.
    pub fn status(&self, id: ParticipantId) -> Option<ParticipantStatus> {
        self.participants.get(&id).map(|p| p.status)
    }

    /// Update a participant's status.
    ///
    /// Returns `false` if the participant is not registered.
    pub fn set_status(&mut self, id: ParticipantId, status: ParticipantStatus) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) => {
                participant.status = status;
                true
            },
            None => false,
        }
    }

    /// Public summary of a participant.
    pub fn summary(&self, id: ParticipantId) -> Option<ParticipantSummary> {
        self.participants.get(&id).map(Participant::summary)
    }

    /// All participants in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.participants.values()
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether no participant is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

fn validate_name(raw: &str, max_len: usize) -> Result<String, RegistrationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RegistrationError::InvalidName("name must not be empty".to_string()));
    }
    if name.chars().count() > max_len {
        return Err(RegistrationError::InvalidName(format!(
            "name longer than {max_len} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(RegistrationError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}
