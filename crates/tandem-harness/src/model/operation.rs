//! Operations for model-based testing.
//!
//! Operations represent every request a client can make plus the ambient
//! events the runtime delivers. They are generated randomly by proptest or
//! `arbitrary` and applied to a [`super::SimWorld`].

use arbitrary::Arbitrary;

/// Client slot (0-indexed, wrapped to the world's slot count).
pub type ClientId = u8;

/// Display names operations pick from.
///
/// Includes duplicates-by-trim and invalid entries so name validation and
/// uniqueness are exercised.
pub const NAMES: [&str; 8] = [
    "alice",
    "bob",
    "carol",
    "dave",
    "  alice  ",
    "",
    "bell\u{7}",
    "a-name-that-is-far-too-long-to-register",
];

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Claim a display name.
    Register {
        /// Client performing the operation.
        client_id: ClientId,
        /// Index into [`NAMES`].
        name: u8,
    },

    /// Register and enqueue in one step.
    Join {
        /// Client performing the operation.
        client_id: ClientId,
        /// Index into [`NAMES`].
        name: u8,
    },

    /// Enter the waiting pool.
    Enqueue {
        /// Client performing the operation.
        client_id: ClientId,
    },

    /// Leave the waiting pool.
    LeaveQueue {
        /// Client performing the operation.
        client_id: ClientId,
    },

    /// Invite another client's participant.
    Invite {
        /// Inviting client.
        client_id: ClientId,
        /// Client whose participant is targeted. Unregistered targets map to
        /// an id nobody holds.
        target_id: ClientId,
    },

    /// Add to the tally in the client's session.
    Add {
        /// Acting client.
        client_id: ClientId,
        /// Amount (wrapped to 0-4; zero is illegal).
        amount: u8,
    },

    /// Free action in the client's session.
    Peek {
        /// Acting client.
        client_id: ClientId,
    },

    /// Commit the current round.
    Commit {
        /// Committing client.
        client_id: ClientId,
        /// Category index; one past the last names an unknown category.
        category: u8,
        /// Client-claimed score.
        claim: Option<u8>,
    },

    /// Send undecodable text.
    Garbage {
        /// Sending client.
        client_id: ClientId,
    },

    /// Close the client's connection.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },

    /// Open a fresh connection in a closed slot.
    Reconnect {
        /// Client reconnecting.
        client_id: ClientId,
    },

    /// Advance virtual time.
    AdvanceTime {
        /// Seconds to advance.
        secs: u8,
    },

    /// Deliver one tick.
    Tick,
}

impl Operation {
    /// Client the operation acts for, if any.
    pub fn client(&self) -> Option<ClientId> {
        match *self {
            Self::Register { client_id, .. }
            | Self::Join { client_id, .. }
            | Self::Enqueue { client_id }
            | Self::LeaveQueue { client_id }
            | Self::Invite { client_id, .. }
            | Self::Add { client_id, .. }
            | Self::Peek { client_id }
            | Self::Commit { client_id, .. }
            | Self::Garbage { client_id }
            | Self::Disconnect { client_id }
            | Self::Reconnect { client_id } => Some(client_id),
            Self::AdvanceTime { .. } | Self::Tick => None,
        }
    }
}
