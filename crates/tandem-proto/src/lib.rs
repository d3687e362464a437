//! Tandem wire protocol.
//!
//! Every message on a Tandem channel is a single JSON object carrying a `type`
//! discriminator and camelCase fields. Clients only ever submit intents
//! ([`ClientMessage`]); all authoritative state flows back as
//! [`ServerMessage`]s.
//!
//! # Components
//!
//! - [`ids`]: participant, session and connection identifiers
//! - [`payloads`]: client/server message enums and the error payload
//! - [`errors`]: encode/decode failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod ids;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use ids::{ConnectionId, ParticipantId, SessionId};
pub use payloads::{
    AbortReason, ClientMessage, ErrorCode, ErrorKind, ErrorPayload, ParticipantSummary, ScoreCard,
    ServerMessage,
};
