//! Simulated world for operation sequences.
//!
//! A fixed number of client slots, each holding at most one open connection to
//! a [`SimServer`] playing [`TallyRules`]. Operations address slots; a slot
//! whose connection was closed ignores everything except `Reconnect`.

use std::time::Duration;

use tandem_core::RuleModule;
use tandem_proto::{ClientMessage, ConnectionId, ErrorCode, ParticipantId, ServerMessage, SessionId};
use tandem_server::DriverConfig;

use super::operation::{ClientId, NAMES, Operation};
use crate::{
    rules::{self, TallyRules},
    sim_server::{SimError, SimServer},
};

/// Participant id no registration ever receives in a bounded run.
const UNKNOWN_PARTICIPANT: ParticipantId = ParticipantId(u64::MAX);

/// Session id the store never allocates.
const UNKNOWN_SESSION: SessionId = SessionId(0);

/// What happened to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The slot was closed (or already open, for `Reconnect`)
    Skipped,
    /// Applied; the sender received no error
    Accepted,
    /// The sender received an error with this code
    Rejected(ErrorCode),
}

/// World of client slots around one simulation server.
pub struct SimWorld {
    server: SimServer<TallyRules>,
    slots: Vec<Option<ConnectionId>>,
}

impl SimWorld {
    /// World with `num_clients` connected slots.
    pub fn new(num_clients: usize, seed: u64) -> Result<Self, SimError> {
        Self::with_config(num_clients, seed, DriverConfig::default())
    }

    /// World with custom driver config.
    pub fn with_config(num_clients: usize, seed: u64, config: DriverConfig) -> Result<Self, SimError> {
        let mut server = SimServer::with_config(TallyRules::default(), config, seed);
        let slots = (0..num_clients)
            .map(|_| server.connect().map(Some))
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self { server, slots })
    }

    /// Number of client slots.
    pub fn num_clients(&self) -> usize {
        self.slots.len()
    }

    /// The simulation server.
    pub fn server(&self) -> &SimServer<TallyRules> {
        &self.server
    }

    /// Open connection in `client_id`'s slot.
    pub fn connection(&self, client_id: ClientId) -> Option<ConnectionId> {
        self.slots.get(self.slot(client_id)).copied().flatten()
    }

    /// Participant registered by `client_id`'s current connection.
    pub fn participant(&self, client_id: ClientId) -> Option<ParticipantId> {
        let connection = self.connection(client_id)?;
        self.server.driver().registry().participant_for_connection(connection)
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> Result<OperationResult, SimError> {
        match *op {
            Operation::AdvanceTime { secs } => {
                self.server.advance(Duration::from_secs(u64::from(secs)));
                return Ok(OperationResult::Accepted);
            },
            Operation::Tick => {
                self.server.tick()?;
                return Ok(OperationResult::Accepted);
            },
            Operation::Reconnect { client_id } => return self.reconnect(client_id),
            _ => {},
        }

        let Some(client_id) = op.client() else {
            return Ok(OperationResult::Skipped);
        };
        let Some(connection) = self.connection(client_id) else {
            return Ok(OperationResult::Skipped);
        };

        if let Operation::Disconnect { .. } = op {
            let slot = self.slot(client_id);
            self.slots[slot] = None;
            self.server.disconnect(connection)?;
            return Ok(OperationResult::Accepted);
        }

        self.server.take_messages(connection);
        match self.request(client_id, op) {
            Some(Request::Message(message)) => self.server.send(connection, &message)?,
            Some(Request::Raw(text)) => self.server.send_raw(connection, text)?,
            None => return Ok(OperationResult::Skipped),
        }

        let error = self.server.take_messages(connection).into_iter().find_map(|m| match m {
            ServerMessage::Error(payload) => Some(payload.code),
            _ => None,
        });
        Ok(error.map_or(OperationResult::Accepted, OperationResult::Rejected))
    }

    fn reconnect(&mut self, client_id: ClientId) -> Result<OperationResult, SimError> {
        let slot = self.slot(client_id);
        if self.slots.get(slot).is_none_or(Option::is_some) {
            return Ok(OperationResult::Skipped);
        }
        let connection = self.server.connect()?;
        self.slots[slot] = self.server.is_open(connection).then_some(connection);
        Ok(OperationResult::Accepted)
    }

    fn request(&self, client_id: ClientId, op: &Operation) -> Option<Request> {
        let session_id = || {
            self.participant(client_id)
                .and_then(|p| self.server.driver().sessions().session_for(p))
                .unwrap_or(UNKNOWN_SESSION)
        };

        let message = match *op {
            Operation::Register { name, .. } => {
                ClientMessage::Register { display_name: pick_name(name) }
            },
            Operation::Join { name, .. } => ClientMessage::Join { display_name: pick_name(name) },
            Operation::Enqueue { .. } => ClientMessage::Enqueue,
            Operation::LeaveQueue { .. } => ClientMessage::LeaveQueue,
            Operation::Invite { target_id, .. } => ClientMessage::Invite {
                target_participant_id: self.participant(target_id).unwrap_or(UNKNOWN_PARTICIPANT),
            },
            Operation::Add { amount, .. } => ClientMessage::Action {
                session_id: session_id(),
                payload: rules::add(u32::from(amount % 5)),
            },
            Operation::Peek { .. } => {
                ClientMessage::Action { session_id: session_id(), payload: rules::peek() }
            },
            Operation::Commit { category, claim, .. } => {
                let categories = self.server.driver().rules().categories();
                let category = categories
                    .get(usize::from(category) % (categories.len() + 1))
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                ClientMessage::CommitResult {
                    session_id: session_id(),
                    category,
                    score: claim.map(u32::from),
                }
            },
            Operation::Garbage { .. } => return Some(Request::Raw("{\"type\":".to_string())),
            Operation::Disconnect { .. }
            | Operation::Reconnect { .. }
            | Operation::AdvanceTime { .. }
            | Operation::Tick => return None,
        };
        Some(Request::Message(message))
    }

    fn slot(&self, client_id: ClientId) -> usize {
        usize::from(client_id) % self.slots.len().max(1)
    }
}

/// Wire form of one client request.
enum Request {
    Message(ClientMessage),
    Raw(String),
}

fn pick_name(index: u8) -> String {
    NAMES[usize::from(index) % NAMES.len()].to_string()
}
