//! In-process simulation server.
//!
//! `SimServer` drives a `ServerDriver` over [`SimEnv`] with no sockets.
//! Tests explicitly connect, send and disconnect; every outbound message is
//! encoded to JSON and decoded back before landing in the recipient's outbox,
//! so the wire format is exercised on every delivery. Server-initiated closes
//! are fed back to the driver as `ConnectionClosed`, as the production
//! runtime does.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    time::Duration,
};

use tandem_core::rules::RuleModule;
use tandem_proto::{ClientMessage, ConnectionId, ProtocolError, ServerMessage};
use tandem_server::{DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent};

use crate::SimEnv;

/// Failures while driving the simulation.
#[derive(Debug)]
pub enum SimError {
    /// The driver refused the event
    Driver(DriverError),
    /// A message failed to encode or decode
    Protocol(ProtocolError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(err) => write!(f, "driver error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<DriverError> for SimError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<ProtocolError> for SimError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

/// Simulation server for deterministic tests.
pub struct SimServer<R: RuleModule> {
    /// The action-based server driver
    driver: ServerDriver<SimEnv, R>,
    /// Shared handle on the driver's clock and RNG
    env: SimEnv,
    /// Delivered messages per open connection
    outboxes: BTreeMap<ConnectionId, Vec<ServerMessage>>,
    /// Connections closed by the server, with the reason given
    closed: BTreeMap<ConnectionId, String>,
    /// Connections the test has opened and not yet closed
    open: BTreeSet<ConnectionId>,
    /// Log actions in emission order
    logs: Vec<(LogLevel, String)>,
    /// Next connection ID
    next_connection_id: ConnectionId,
}

impl<R: RuleModule> SimServer<R> {
    /// Create a simulation server with default config and seed 0.
    pub fn new(rules: R) -> Self {
        Self::with_config(rules, DriverConfig::default(), 0)
    }

    /// Create a simulation server with custom config and seed.
    pub fn with_config(rules: R, config: DriverConfig, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        Self {
            driver: ServerDriver::new(env.clone(), rules, config),
            env,
            outboxes: BTreeMap::new(),
            closed: BTreeMap::new(),
            open: BTreeSet::new(),
            logs: Vec::new(),
            next_connection_id: 1,
        }
    }

    /// Open a new connection and return its ID.
    ///
    /// A connection refused at capacity is closed immediately; check
    /// [`SimServer::close_reason`].
    pub fn connect(&mut self) -> Result<ConnectionId, SimError> {
        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        self.open.insert(connection_id);
        self.outboxes.insert(connection_id, Vec::new());
        self.process(ServerEvent::ConnectionAccepted { connection_id })?;
        Ok(connection_id)
    }

    /// Send a client message from `connection_id`.
    pub fn send(&mut self, connection_id: ConnectionId, message: &ClientMessage) -> Result<(), SimError> {
        let payload = message.encode()?;
        self.send_raw(connection_id, payload)
    }

    /// Send raw text from `connection_id`, bypassing client-side encoding.
    pub fn send_raw(
        &mut self,
        connection_id: ConnectionId,
        payload: impl Into<String>,
    ) -> Result<(), SimError> {
        self.process(ServerEvent::MessageReceived { connection_id, payload: payload.into() })
    }

    /// Close `connection_id` from the client side.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Result<(), SimError> {
        self.open.remove(&connection_id);
        self.process(ServerEvent::ConnectionClosed {
            connection_id,
            reason: "client disconnected".to_string(),
        })
    }

    /// Deliver one `Tick`.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.process(ServerEvent::Tick)
    }

    /// Advance virtual time without ticking.
    pub fn advance(&self, duration: Duration) {
        self.env.advance(duration);
    }

    /// Drain every message delivered to `connection_id` so far.
    pub fn take_messages(&mut self, connection_id: ConnectionId) -> Vec<ServerMessage> {
        self.outboxes.get_mut(&connection_id).map(std::mem::take).unwrap_or_default()
    }

    /// Drain the outboxes of every connection.
    pub fn clear_messages(&mut self) {
        for outbox in self.outboxes.values_mut() {
            outbox.clear();
        }
    }

    /// Reason the server gave for closing `connection_id`, if it did.
    pub fn close_reason(&self, connection_id: ConnectionId) -> Option<&str> {
        self.closed.get(&connection_id).map(String::as_str)
    }

    /// Whether `connection_id` is still open.
    pub fn is_open(&self, connection_id: ConnectionId) -> bool {
        self.open.contains(&connection_id)
    }

    /// Open connections in id order.
    pub fn open_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.open.iter().copied()
    }

    /// Log actions emitted so far.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv, R> {
        &self.driver
    }

    /// Environment shared with the driver.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Process an event and every close it triggers.
    fn process(&mut self, event: ServerEvent) -> Result<(), SimError> {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let actions = self.driver.process_event(event)?;
            pending.extend(self.execute(actions)?);
        }
        Ok(())
    }

    /// Execute actions, returning follow-up close events.
    fn execute(
        &mut self,
        actions: Vec<ServerAction<crate::sim_env::SimInstant>>,
    ) -> Result<Vec<ServerEvent>, SimError> {
        let mut follow_up = Vec::new();
        for action in actions {
            match action {
                ServerAction::SendToConnection { connection_id, message } => {
                    let delivered = ServerMessage::decode(&message.encode()?)?;
                    if self.open.contains(&connection_id)
                        && let Some(outbox) = self.outboxes.get_mut(&connection_id)
                    {
                        outbox.push(delivered);
                    }
                },
                ServerAction::CloseConnection { connection_id, reason } => {
                    tracing::debug!("sim closing {}: {}", connection_id, reason);
                    if self.open.remove(&connection_id) {
                        follow_up
                            .push(ServerEvent::ConnectionClosed { connection_id, reason: reason.clone() });
                    }
                    self.closed.insert(connection_id, reason);
                },
                ServerAction::Log { level, message, .. } => {
                    self.logs.push((level, message));
                },
            }
        }
        Ok(follow_up)
    }
}

#[cfg(test)]
mod tests {
    use tandem_proto::ParticipantId;

    use super::*;
    use crate::rules::TallyRules;

    #[test]
    fn messages_land_in_the_sender_outbox() {
        let mut server = SimServer::new(TallyRules::default());
        let conn = server.connect().unwrap();

        server.send(conn, &ClientMessage::Register { display_name: "alice".to_string() }).unwrap();

        let messages = server.take_messages(conn);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            ServerMessage::Registered { participant } if participant.id == ParticipantId(1)
        ));
        assert!(server.take_messages(conn).is_empty());
    }

    #[test]
    fn capacity_refusal_is_recorded() {
        let config = DriverConfig { max_connections: 1, ..DriverConfig::default() };
        let mut server = SimServer::with_config(TallyRules::default(), config, 0);

        let first = server.connect().unwrap();
        let second = server.connect().unwrap();

        assert!(server.is_open(first));
        assert!(!server.is_open(second));
        assert_eq!(server.close_reason(second), Some("max connections exceeded"));
        assert_eq!(server.driver().connection_count(), 1);
    }

    #[test]
    fn disconnect_frees_the_participant() {
        let mut server = SimServer::new(TallyRules::default());
        let conn = server.connect().unwrap();
        server.send(conn, &ClientMessage::Join { display_name: "alice".to_string() }).unwrap();

        server.disconnect(conn).unwrap();

        assert!(server.driver().registry().is_empty());
        assert!(server.driver().pool().is_empty());
        assert_eq!(server.driver().connection_count(), 0);
    }
}
