//! JSON-encoded protocol messages.
//!
//! Messages are internally tagged: the `type` field names the variant and the
//! remaining fields are the variant's content. Unknown fields are ignored so
//! older servers tolerate newer clients.
//!
//! # Invariants
//!
//! Each variant maps to exactly one `type` tag (enforced by serde's derive).
//! Encoding then decoding a message yields an equal value.

pub mod client;
pub mod server;

pub use client::ClientMessage;
use serde::{Deserialize, Serialize};
pub use server::{AbortReason, ParticipantSummary, ScoreCard, ServerMessage};

/// Error payload carried by `error` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    /// Create an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Machine-readable error codes.
///
/// Serialized as the variant name (e.g. `"NotYourTurn"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Display name empty, too long, or containing control characters.
    InvalidName,
    /// Display name already held by a registered participant.
    NameTaken,
    /// Inbound message could not be decoded or was too large.
    InvalidMessage,
    /// Connection already owns a participant.
    AlreadyRegistered,
    /// Connection has not registered yet.
    NotRegistered,
    /// Participant is already in a session.
    AlreadyInSession,
    /// Participant is not in the waiting pool.
    NotWaiting,
    /// Invitation target is the inviter.
    InvalidTarget,
    /// Session does not exist or the sender is not a member.
    SessionNotFound,
    /// Sender is not the current actor.
    NotYourTurn,
    /// No actions left this turn.
    BudgetExhausted,
    /// Rule module rejected the action.
    IllegalAction,
    /// Category already holds a result for this participant.
    CategoryAlreadyFilled,
    /// Category is not scored by this game.
    UnknownCategory,
    /// Client-claimed score differs from the server-computed score.
    ScoreMismatch,
    /// Server-side failure unrelated to the request.
    Internal,
}

/// Broad classification of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input rejected before touching any state.
    Validation,
    /// Request conflicts with the current lifecycle or turn state.
    Protocol,
    /// Rule module refused the action; the actor may retry.
    RuleViolation,
    /// Server fault.
    Internal,
}

impl ErrorCode {
    /// Classification of this code.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidName | Self::NameTaken | Self::InvalidMessage => ErrorKind::Validation,
            Self::AlreadyRegistered
            | Self::NotRegistered
            | Self::AlreadyInSession
            | Self::NotWaiting
            | Self::InvalidTarget
            | Self::SessionNotFound
            | Self::NotYourTurn
            | Self::BudgetExhausted
            | Self::CategoryAlreadyFilled
            | Self::UnknownCategory
            | Self::ScoreMismatch => ErrorKind::Protocol,
            Self::IllegalAction => ErrorKind::RuleViolation,
            Self::Internal => ErrorKind::Internal,
        }
    }
}
