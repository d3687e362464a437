//! Driver error types.
//!
//! Two layers:
//! - [`DriverError`]: faults in the event stream itself (unknown or duplicate
//!   connection ids). Returned from `process_event`; the runtime logs them.
//! - [`CoordinatorError`]: a client request was refused. Never returned from
//!   `process_event`; converted to an `error` message for the offending
//!   connection instead.

use std::fmt;

use tandem_proto::{ConnectionId, ErrorCode, ParticipantId, ProtocolError, SessionId};
use thiserror::Error;

use crate::{registry::RegistrationError, session_store::SessionStoreError, turn::TurnError};

/// Errors in the event stream fed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Event referenced a connection the driver never accepted.
    ///
    /// Indicates the runtime forwarded a message after closure, or raced
    /// accept against receive. The event is dropped.
    ConnectionNotFound(ConnectionId),

    /// Accept event reused a live connection id.
    ///
    /// Connection ids must be unique among live connections. This is a
    /// runtime bug; the duplicate is ignored.
    ConnectionAlreadyExists(ConnectionId),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionNotFound(id) => write!(f, "connection not found: {id}"),
            Self::ConnectionAlreadyExists(id) => write!(f, "connection already exists: {id}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// A client request the coordinator refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Inbound text could not be decoded
    #[error(transparent)]
    InvalidMessage(#[from] ProtocolError),

    /// Registration refused
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Connection has not registered yet
    #[error("register before sending this message")]
    NotRegistered,

    /// Participant is in a session
    #[error("participant {0} is already in a session")]
    AlreadyInSession(ParticipantId),

    /// Participant is not in the waiting pool
    #[error("participant {0} is not waiting")]
    NotWaiting(ParticipantId),

    /// Participant invited themselves
    #[error("cannot invite yourself")]
    InvalidTarget,

    /// Session does not exist or sender is not a member
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Turn engine refused the request
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// Session store rejected an insert
    #[error(transparent)]
    Store(#[from] SessionStoreError),

    /// Round state could not be serialized
    #[error("failed to encode round state: {0}")]
    Encoding(String),
}

impl CoordinatorError {
    /// Wire error code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMessage(_) => ErrorCode::InvalidMessage,
            Self::Registration(RegistrationError::AlreadyRegistered(_)) => {
                ErrorCode::AlreadyRegistered
            },
            Self::Registration(RegistrationError::InvalidName(_)) => ErrorCode::InvalidName,
            Self::Registration(RegistrationError::NameTaken(_)) => ErrorCode::NameTaken,
            Self::NotRegistered => ErrorCode::NotRegistered,
            Self::AlreadyInSession(_) => ErrorCode::AlreadyInSession,
            Self::NotWaiting(_) => ErrorCode::NotWaiting,
            Self::InvalidTarget => ErrorCode::InvalidTarget,
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::Turn(err) => err.code(),
            Self::Store(_) | Self::Encoding(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display() {
        let err = DriverError::ConnectionNotFound(42);
        assert_eq!(err.to_string(), "connection not found: 42");

        let err = DriverError::ConnectionAlreadyExists(7);
        assert_eq!(err.to_string(), "connection already exists: 7");
    }

    #[test]
    fn coordinator_error_codes() {
        let err = CoordinatorError::from(RegistrationError::NameTaken("ada".to_string()));
        assert_eq!(err.code(), ErrorCode::NameTaken);
        assert_eq!(err.to_string(), "display name already taken: ada");

        let err = CoordinatorError::from(TurnError::BudgetExhausted);
        assert_eq!(err.code(), ErrorCode::BudgetExhausted);

        let err = CoordinatorError::from(ProtocolError::TooLarge { size: 20, max: 10 });
        assert_eq!(err.code(), ErrorCode::InvalidMessage);

        assert_eq!(CoordinatorError::Encoding("x".to_string()).code(), ErrorCode::Internal);
    }
}
