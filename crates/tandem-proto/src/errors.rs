//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Inbound text was not a well-formed message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Inbound text exceeded the configured size limit.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Size of the rejected message in bytes
        size: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
