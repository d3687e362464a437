//! Client-to-server messages.
//!
//! Clients submit intents only. Action payloads are opaque here and decoded by
//! the game's rule module; commit scores are recomputed server-side and the
//! optional `score` field is only cross-checked.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::{ParticipantId, SessionId},
};

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Claim a display name for this connection.
    Register {
        /// Requested display name
        display_name: String,
    },

    /// Enter the waiting pool.
    Enqueue,

    /// Register and enqueue in one step.
    Join {
        /// Requested display name
        display_name: String,
    },

    /// Leave the waiting pool without disconnecting.
    LeaveQueue,

    /// Start a session with another waiting participant.
    Invite {
        /// Participant to pair with
        target_participant_id: ParticipantId,
    },

    /// Submit a game action for the current turn.
    Action {
        /// Session the action targets
        session_id: SessionId,
        /// Game-specific action, decoded by the rule module
        payload: serde_json::Value,
    },

    /// Record the current round's result in a scoring category.
    CommitResult {
        /// Session the commit targets
        session_id: SessionId,
        /// Scoring category to fill
        category: String,
        /// Optional client-side score, checked against the server's
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<u32>,
    },
}

impl ClientMessage {
    /// Decode a message from JSON text.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a message, rejecting text longer than `max_bytes` first.
    pub fn decode_bounded(text: &str, max_bytes: usize) -> Result<Self> {
        if text.len() > max_bytes {
            return Err(ProtocolError::TooLarge { size: text.len(), max: max_bytes });
        }
        Self::decode(text)
    }

    /// Encode the message as JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}
