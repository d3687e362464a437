//! Server-to-client messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::{ParticipantId, SessionId},
    payloads::ErrorPayload,
};

/// Public view of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Participant id
    pub id: ParticipantId,
    /// Display name
    pub display_name: String,
}

/// Accumulated results for one seat of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    /// Participant owning this card
    pub participant_id: ParticipantId,
    /// Filled categories and their scores
    pub categories: BTreeMap<String, u32>,
    /// Sum over all filled categories
    pub total: u32,
}

/// Why a session was ended by the server rather than by play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    /// No action or commit within the configured turn timeout.
    TimedOut,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Registration succeeded; tells the client its own id.
    Registered {
        /// The new participant
        participant: ParticipantSummary,
    },

    /// Current waiting pool, in insertion order.
    PoolUpdate {
        /// Waiting participants
        participants: Vec<ParticipantSummary>,
    },

    /// A session was formed with the recipient as a member.
    SessionStart {
        /// New session id
        session_id: SessionId,
        /// The other member
        opponent: ParticipantSummary,
        /// Participant who acts first
        first_actor: ParticipantId,
        /// Initial round state
        round_state: serde_json::Value,
        /// Actions available in the first turn
        turn_budget: u32,
    },

    /// Session state after an accepted action or commit.
    StateUpdate {
        /// Session id
        session_id: SessionId,
        /// Current round state
        round_state: serde_json::Value,
        /// Current actor
        actor: ParticipantId,
        /// Actions left this turn
        turn_budget: u32,
        /// Score cards in seat order
        scores: Vec<ScoreCard>,
    },

    /// Every category was filled for both members.
    SessionComplete {
        /// Session id
        session_id: SessionId,
        /// Participant with the strictly higher total, `null` on a draw
        winner: Option<ParticipantId>,
        /// Final score cards in seat order
        final_scores: Vec<ScoreCard>,
    },

    /// The other member disconnected; the session is gone.
    OpponentLeft {
        /// Session that was torn down
        session_id: SessionId,
    },

    /// The server ended the session.
    SessionAborted {
        /// Session that was torn down
        session_id: SessionId,
        /// Why it ended
        reason: AbortReason,
    },

    /// A request was rejected; no state changed.
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Encode the message as JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode a message from JSON text.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Session this message concerns, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::SessionStart { session_id, .. }
            | Self::StateUpdate { session_id, .. }
            | Self::SessionComplete { session_id, .. }
            | Self::OpponentLeft { session_id }
            | Self::SessionAborted { session_id, .. } => Some(*session_id),
            Self::Registered { .. } | Self::PoolUpdate { .. } | Self::Error(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payloads::ErrorCode;

    #[test]
    fn error_is_flattened_into_tagged_object() {
        let msg = ServerMessage::Error(ErrorPayload::new(ErrorCode::NotYourTurn, "wait"));
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "code": "NotYourTurn", "message": "wait"}));
    }

    #[test]
    fn draw_serializes_null_winner() {
        let msg = ServerMessage::SessionComplete {
            session_id: SessionId(2),
            winner: None,
            final_scores: vec![],
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["winner"], serde_json::Value::Null);
        assert_eq!(value["type"], "sessionComplete");
        assert_eq!(value["finalScores"], json!([]));
    }

    #[test]
    fn abort_reason_is_camel_case() {
        let msg = ServerMessage::SessionAborted {
            session_id: SessionId(5),
            reason: AbortReason::TimedOut,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "sessionAborted", "sessionId": 5, "reason": "timedOut"}));
    }
}
