//! Tandem production server.
//!
//! Two-player, turn-based session coordinator. Clients register a display
//! name, wait in a shared pool, pair up by invitation (or automatically), and
//! play a game defined by a [`RuleModule`] with the server as the single
//! authority over turn order, budgets and scores.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: it consumes
//! [`ServerEvent`]s and returns [`ServerAction`]s. [`Server`] executes those
//! actions over WebSockets using Tokio. A single coordinator task owns the
//! driver; connection tasks forward inbound frames to it over a channel and
//! drain their own outbound channel into the socket.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`IdentityRegistry`], [`WaitingPool`], [`SessionStore`], [`TurnEngine`]:
//!   coordinator state
//! - [`Server`]: Production runtime that executes ServerDriver actions
//! - [`WebSocketTransport`]: TCP listener with WebSocket upgrade
//! - [`SystemEnv`]: Production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod pool;
mod registry;
mod router;
mod server_error;
mod session_store;
mod system_env;
mod transport;
mod turn;

use std::{collections::HashMap, net::SocketAddr, time::Duration};

pub use driver::{
    DriverConfig, LogLevel, PairingPolicy, ServerAction, ServerDriver, ServerEvent, TeardownReason,
};
pub use error::ServerError;
use futures::{SinkExt, StreamExt};
pub use pool::WaitingPool;
pub use registry::{IdentityRegistry, Participant, ParticipantStatus, RegistrationError};
pub use router::BroadcastRouter;
pub use server_error::{CoordinatorError, DriverError};
pub use session_store::{Phase, Session, SessionStore, SessionStoreError};
pub use system_env::SystemEnv;
use tandem_core::{env::Environment, rules::RuleModule};
use tandem_proto::ConnectionId;
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_tungstenite::tungstenite::Message;
pub use transport::WebSocketTransport;
pub use turn::{CommitOutcome, TurnEngine, TurnError};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Interval between `Tick` events
    pub tick_interval: Duration,
    /// Driver configuration (limits, pairing, timeout)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tick_interval: Duration::from_secs(1),
            driver: DriverConfig::default(),
        }
    }
}

/// Outbound instruction for one connection task.
#[derive(Debug)]
enum Outbound {
    /// Send one JSON text frame
    Text(String),
    /// Send a close frame and stop
    Close(String),
}

/// Events delivered to the coordinator task.
#[derive(Debug)]
enum RuntimeEvent {
    /// A connection finished its handshake; register its outbound channel
    /// before the driver sees the accept.
    Opened { connection_id: ConnectionId, outbound: UnboundedSender<Outbound> },
    /// Anything else, forwarded to the driver as-is
    Driver(ServerEvent),
}

/// Production Tandem server.
///
/// Wraps `ServerDriver` with WebSocket transport and system environment.
pub struct Server<R: RuleModule> {
    /// The action-based server driver
    driver: ServerDriver<SystemEnv, R>,
    /// TCP/WebSocket listener
    transport: WebSocketTransport,
    /// Interval between ticks
    tick_interval: Duration,
    /// Largest inbound WebSocket message accepted by the transport
    max_message_bytes: usize,
}

impl<R: RuleModule> Server<R> {
    /// Create and bind a new server playing `rules`.
    pub async fn bind(config: ServerRuntimeConfig, rules: R) -> Result<Self, ServerError> {
        if config.tick_interval.is_zero() {
            return Err(ServerError::Config("tick interval must be non-zero".to_string()));
        }

        let max_message_bytes = config.driver.max_message_bytes;
        let driver = ServerDriver::new(SystemEnv::new(), rules, config.driver);
        let transport = WebSocketTransport::bind(&config.bind_address).await?;

        Ok(Self { driver, transport, tick_interval: config.tick_interval, max_message_bytes })
    }

    /// Run the server, accepting connections and processing messages.
    ///
    /// Returns an error once the coordinator task stops, since no connection
    /// can make progress without it.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut coordinator = tokio::spawn(coordinate(self.driver, events_rx));
        tokio::spawn(tick(self.tick_interval, events_tx.clone()));

        let max_message_bytes = self.max_message_bytes;
        let mut next_connection_id: ConnectionId = 1;
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection_id = next_connection_id;
                        next_connection_id += 1;
                        let events = events_tx.clone();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, connection_id, max_message_bytes, events).await
                            {
                                tracing::debug!("Connection {} from {} failed: {}", connection_id, peer, e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
                stopped = &mut coordinator => {
                    let reason = match stopped {
                        Ok(()) => "coordinator stopped".to_string(),
                        Err(e) => format!("coordinator task failed: {e}"),
                    };
                    tracing::error!("{}", reason);
                    return Err(ServerError::Internal(reason));
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Coordinator loop: the only owner of the driver.
async fn coordinate<E, R>(mut driver: ServerDriver<E, R>, mut events: UnboundedReceiver<RuntimeEvent>)
where
    E: Environment,
    R: RuleModule,
{
    let mut outbound: HashMap<ConnectionId, UnboundedSender<Outbound>> = HashMap::new();

    while let Some(event) = events.recv().await {
        let event = match event {
            RuntimeEvent::Opened { connection_id, outbound: sender } => {
                outbound.insert(connection_id, sender);
                ServerEvent::ConnectionAccepted { connection_id }
            },
            RuntimeEvent::Driver(event) => event,
        };

        let closed = match &event {
            ServerEvent::ConnectionClosed { connection_id, .. } => Some(*connection_id),
            _ => None,
        };

        match driver.process_event(event) {
            Ok(actions) => execute_actions(actions, &mut outbound),
            Err(e) => tracing::warn!("Event processing error: {}", e),
        }

        if let Some(connection_id) = closed {
            outbound.remove(&connection_id);
        }
    }

    tracing::info!("Coordinator stopped");
}

/// Periodic tick source.
async fn tick(interval: Duration, events: UnboundedSender<RuntimeEvent>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if events.send(RuntimeEvent::Driver(ServerEvent::Tick)).is_err() {
            break;
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    connection_id: ConnectionId,
    max_message_bytes: usize,
    events: UnboundedSender<RuntimeEvent>,
) -> Result<(), ServerError> {
    let ws = transport::upgrade(stream, max_message_bytes).await?;
    let (mut sink, mut source) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    tracing::debug!("New connection: {}", connection_id);

    events
        .send(RuntimeEvent::Opened { connection_id, outbound: outbound_tx })
        .map_err(|_| ServerError::Internal("coordinator stopped".to_string()))?;

    let reason = loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = ServerEvent::MessageReceived {
                        connection_id,
                        payload: text.as_str().to_owned(),
                    };
                    if events.send(RuntimeEvent::Driver(event)).is_err() {
                        break "coordinator stopped".to_string();
                    }
                },
                Some(Ok(Message::Binary(data))) => {
                    let event = ServerEvent::MessageReceived {
                        connection_id,
                        payload: String::from_utf8_lossy(&data).into_owned(),
                    };
                    if events.send(RuntimeEvent::Driver(event)).is_err() {
                        break "coordinator stopped".to_string();
                    }
                },
                Some(Ok(Message::Close(_))) | None => break "closed by peer".to_string(),
                Some(Ok(_)) => {},
                Some(Err(e)) => break format!("read error: {e}"),
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        break format!("write error: {e}");
                    }
                },
                Some(Outbound::Close(reason)) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break reason;
                },
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break "dropped by coordinator".to_string();
                },
            },
        }
    };

    tracing::debug!("Connection {} closed: {}", connection_id, reason);

    // Coordinator may already be gone during shutdown.
    let _ = events.send(RuntimeEvent::Driver(ServerEvent::ConnectionClosed { connection_id, reason }));
    Ok(())
}

/// Execute server actions.
fn execute_actions<I>(
    actions: Vec<ServerAction<I>>,
    outbound: &mut HashMap<ConnectionId, UnboundedSender<Outbound>>,
) {
    for action in actions {
        match action {
            ServerAction::SendToConnection { connection_id, message } => {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode message for {}: {}", connection_id, e);
                        continue;
                    },
                };

                match outbound.get(&connection_id) {
                    Some(sender) => {
                        if sender.send(Outbound::Text(text)).is_err() {
                            tracing::debug!("SendToConnection: {} already closed", connection_id);
                        }
                    },
                    None => tracing::debug!("SendToConnection: {} not found", connection_id),
                }
            },

            ServerAction::CloseConnection { connection_id, reason } => {
                tracing::info!("Closing connection {}: {}", connection_id, reason);
                if let Some(sender) = outbound.remove(&connection_id) {
                    let _ = sender.send(Outbound::Close(reason));
                }
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}
