//! Server driver.
//!
//! Ties together the identity registry, waiting pool, session store and turn
//! engine. The driver is Sans-IO: the runtime feeds it [`ServerEvent`]s one at
//! a time and executes the [`ServerAction`]s it returns. Because events are
//! processed strictly sequentially, every operation on a session is mutually
//! exclusive with every other.

use std::{collections::HashSet, time::Duration};

use serde::Serialize;
use tandem_core::{env::Environment, rules::RuleModule};
use tandem_proto::{
    AbortReason, ClientMessage, ConnectionId, ErrorPayload, ParticipantId, ServerMessage,
    SessionId,
};

use crate::{
    pool::WaitingPool,
    registry::{IdentityRegistry, ParticipantStatus},
    router::BroadcastRouter,
    server_error::{CoordinatorError, DriverError},
    session_store::{Session, SessionStore},
    turn::{CommitOutcome, TurnEngine},
};

/// How sessions are formed from the waiting pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingPolicy {
    /// Sessions form only through explicit invitations
    #[default]
    Invitation,
    /// On enqueue, the newcomer is paired with the earliest waiting
    /// participant, who acts first. Invitations remain available.
    AutoPair,
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Maximum display name length in characters, after trimming
    pub max_display_name_len: usize,
    /// Maximum inbound message size in bytes
    pub max_message_bytes: usize,
    /// Session formation policy
    pub pairing: PairingPolicy,
    /// Abort sessions idle for this long. `None` disables the timeout.
    pub turn_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_display_name_len: 32,
            max_message_bytes: 16 * 1024,
            pairing: PairingPolicy::Invitation,
            turn_timeout: None,
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        connection_id: ConnectionId,
    },

    /// A text message was received from a connection
    MessageReceived {
        /// Connection that sent the message
        connection_id: ConnectionId,
        /// Raw JSON text
        payload: String,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for timeout checking
    Tick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction<I = std::time::Instant> {
    /// Send a message to a specific connection
    SendToConnection {
        /// Target connection
        connection_id: ConnectionId,
        /// Message to send
        message: ServerMessage,
    },

    /// Close a connection
    CloseConnection {
        /// Connection to close
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Why a session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Every category filled; `sessionComplete` was already sent
    Completed,
    /// A member's connection closed
    Disconnected {
        /// Member that left
        departed: ParticipantId,
    },
    /// No activity within the configured turn timeout
    TimedOut,
}

type Actions<E> = Vec<ServerAction<<E as Environment>::Instant>>;
type Outcome<E> = Result<Actions<E>, CoordinatorError>;

/// Action-based server driver.
///
/// Orchestrates registration, matchmaking, turn processing and
/// disconnection recovery.
pub struct ServerDriver<E, R>
where
    E: Environment,
    R: RuleModule,
{
    /// Live connection ids
    connections: HashSet<ConnectionId>,
    /// Connection ↔ participant registry
    registry: IdentityRegistry,
    /// Participants looking for an opponent
    pool: WaitingPool,
    /// Live sessions
    sessions: SessionStore<R::RoundState, E::Instant>,
    /// Turn state machine over the rule module
    engine: TurnEngine<R>,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E, R> ServerDriver<E, R>
where
    E: Environment,
    R: RuleModule,
{
    /// Create a new server driver.
    pub fn new(env: E, rules: R, config: DriverConfig) -> Self {
        Self {
            connections: HashSet::new(),
            registry: IdentityRegistry::new(),
            pool: WaitingPool::new(),
            sessions: SessionStore::new(),
            engine: TurnEngine::new(rules),
            env,
            config,
        }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver. Refused client
    /// requests are answered with `error` messages and never surface as `Err`.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Actions<E>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { connection_id } => {
                self.handle_connection_accepted(connection_id)
            },
            ServerEvent::MessageReceived { connection_id, payload } => {
                self.handle_message_received(connection_id, &payload)
            },
            ServerEvent::ConnectionClosed { connection_id, reason } => {
                Ok(self.handle_connection_closed(connection_id, &reason))
            },
            ServerEvent::Tick => Ok(self.tick()),
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Actions<E>, DriverError> {
        if self.connections.contains(&connection_id) {
            return Err(DriverError::ConnectionAlreadyExists(connection_id));
        }

        if self.connections.len() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::CloseConnection {
                    connection_id,
                    reason: "max connections exceeded".to_string(),
                },
                self.log(LogLevel::Warn, format!("connection {connection_id} refused: at capacity")),
            ]);
        }

        self.connections.insert(connection_id);

        Ok(vec![self.log(LogLevel::Debug, format!("connection {connection_id} accepted"))])
    }

    /// Handle a text message received from a connection.
    fn handle_message_received(
        &mut self,
        connection_id: ConnectionId,
        payload: &str,
    ) -> Result<Actions<E>, DriverError> {
        if !self.connections.contains(&connection_id) {
            return Err(DriverError::ConnectionNotFound(connection_id));
        }

        let result = ClientMessage::decode_bounded(payload, self.config.max_message_bytes)
            .map_err(CoordinatorError::from)
            .and_then(|message| self.dispatch(connection_id, message));

        Ok(match result {
            Ok(actions) => actions,
            Err(err) => self.reject(connection_id, &err),
        })
    }

    /// Handle a connection being closed.
    ///
    /// Reclaims pool and session membership before freeing the participant.
    /// Closing an unknown connection is a no-op.
    fn handle_connection_closed(&mut self, connection_id: ConnectionId, reason: &str) -> Actions<E> {
        if !self.connections.remove(&connection_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let Some(participant) = self.registry.participant_for_connection(connection_id) {
            actions.extend(self.remove_participant(participant));
        }
        actions.push(self.log(LogLevel::Info, format!("connection {connection_id} closed: {reason}")));
        actions
    }

    /// Route a decoded message by type.
    fn dispatch(&mut self, connection_id: ConnectionId, message: ClientMessage) -> Outcome<E> {
        match message {
            ClientMessage::Register { display_name } => self.register(connection_id, &display_name),
            ClientMessage::Join { display_name } => self.join(connection_id, &display_name),
            ClientMessage::Enqueue => {
                let sender = self.sender(connection_id)?;
                self.enqueue(sender)
            },
            ClientMessage::LeaveQueue => {
                let sender = self.sender(connection_id)?;
                self.leave(sender)
            },
            ClientMessage::Invite { target_participant_id } => {
                let sender = self.sender(connection_id)?;
                self.create_session(sender, target_participant_id)
            },
            ClientMessage::Action { session_id, payload } => {
                let sender = self.sender(connection_id)?;
                self.apply_action(sender, session_id, &payload)
            },
            ClientMessage::CommitResult { session_id, category, score } => {
                let sender = self.sender(connection_id)?;
                self.commit_result(sender, session_id, &category, score)
            },
        }
    }

    fn sender(&self, connection_id: ConnectionId) -> Result<ParticipantId, CoordinatorError> {
        self.registry.participant_for_connection(connection_id).ok_or(CoordinatorError::NotRegistered)
    }

    /// Register a participant for `connection_id`.
    ///
    /// The connection receives `registered` with its new identity.
    pub fn register(&mut self, connection_id: ConnectionId, display_name: &str) -> Outcome<E> {
        let summary = self
            .registry
            .register(connection_id, display_name, self.config.max_display_name_len)?
            .summary();

        let log = self.log(
            LogLevel::Info,
            format!(
                "connection {connection_id} registered as {} ({:?})",
                summary.id, summary.display_name
            ),
        );
        Ok(vec![
            ServerAction::SendToConnection {
                connection_id,
                message: ServerMessage::Registered { participant: summary },
            },
            log,
        ])
    }

    /// Register then enqueue in one step.
    ///
    /// Once registration succeeds the connection always receives
    /// `registered`; a failed enqueue follows it as an `error`.
    pub fn join(&mut self, connection_id: ConnectionId, display_name: &str) -> Outcome<E> {
        let mut actions = self.register(connection_id, display_name)?;
        let participant = self.sender(connection_id)?;
        match self.enqueue(participant) {
            Ok(queued) => actions.extend(queued),
            Err(err) => actions.extend(self.reject(connection_id, &err)),
        }
        Ok(actions)
    }

    /// Add a participant to the waiting pool and broadcast the new listing.
    ///
    /// No-op if already queued. Under [`PairingPolicy::AutoPair`] the
    /// newcomer is immediately paired with the earliest waiting participant.
    pub fn enqueue(&mut self, participant: ParticipantId) -> Outcome<E> {
        match self.registry.status(participant) {
            None => return Err(CoordinatorError::NotRegistered),
            Some(ParticipantStatus::InSession(_)) => {
                return Err(CoordinatorError::AlreadyInSession(participant));
            },
            Some(ParticipantStatus::Waiting) => return Ok(Vec::new()),
            Some(ParticipantStatus::Idle) => {},
        }

        self.pool.enqueue(participant);
        self.registry.set_status(participant, ParticipantStatus::Waiting);

        let mut actions = self.pool_update();
        actions.push(self.log(LogLevel::Debug, format!("{participant} joined the pool")));

        if self.config.pairing == PairingPolicy::AutoPair
            && let Some(creator) = self.pool.earliest_except(participant)
        {
            actions.extend(self.create_session(creator, participant)?);
        }
        Ok(actions)
    }

    /// Remove a participant from the waiting pool.
    ///
    /// The remaining pool and the leaver receive the updated listing.
    pub fn leave(&mut self, participant: ParticipantId) -> Outcome<E> {
        if !self.pool.dequeue(participant) {
            return Err(CoordinatorError::NotWaiting(participant));
        }
        self.registry.set_status(participant, ParticipantStatus::Idle);

        let mut actions = self.pool_update();
        let router = BroadcastRouter::new(&self.registry);
        actions.extend(router.to_participant(participant, ServerMessage::PoolUpdate {
            participants: self.pool.list(&self.registry),
        }));
        actions.push(self.log(LogLevel::Debug, format!("{participant} left the pool")));
        Ok(actions)
    }

    /// Form a session from two waiting participants. `creator` acts first.
    ///
    /// Both leave the pool, each receives `sessionStart` naming the other,
    /// and the remaining pool receives an updated listing.
    pub fn create_session(&mut self, creator: ParticipantId, invitee: ParticipantId) -> Outcome<E> {
        if creator == invitee {
            return Err(CoordinatorError::InvalidTarget);
        }
        for participant in [creator, invitee] {
            if !self.pool.contains(participant) {
                return Err(CoordinatorError::NotWaiting(participant));
            }
        }
        let (Some(creator_summary), Some(invitee_summary)) =
            (self.registry.summary(creator), self.registry.summary(invitee))
        else {
            return Err(CoordinatorError::NotRegistered);
        };

        let now = self.env.now();
        let seed = self.env.random_u64();
        let session_id = self.sessions.allocate_id();
        let session = self.engine.open_session(session_id, [creator, invitee], seed, now);
        let round_state = encode_round(session.round_state())?;
        let turn_budget = session.turn_budget();
        self.sessions.insert(session)?;

        self.pool.dequeue(creator);
        self.pool.dequeue(invitee);
        self.registry.set_status(creator, ParticipantStatus::InSession(session_id));
        self.registry.set_status(invitee, ParticipantStatus::InSession(session_id));

        let router = BroadcastRouter::new(&self.registry);
        let mut actions = Vec::new();
        for (member, opponent) in [(creator, invitee_summary), (invitee, creator_summary)] {
            actions.extend(router.to_participant(member, ServerMessage::SessionStart {
                session_id,
                opponent,
                first_actor: creator,
                round_state: round_state.clone(),
                turn_budget,
            }));
        }
        actions.extend(self.pool_update());
        actions.push(
            self.log(LogLevel::Info, format!("{session_id} started: {creator} vs {invitee}")),
        );
        Ok(actions)
    }

    /// Apply an in-turn action and broadcast the new state to both members.
    pub fn apply_action(
        &mut self,
        participant: ParticipantId,
        session_id: SessionId,
        payload: &serde_json::Value,
    ) -> Outcome<E> {
        let now = self.env.now();
        let session = self
            .sessions
            .get_mut(session_id)
            .filter(|s| s.is_member(participant))
            .ok_or(CoordinatorError::SessionNotFound(session_id))?;

        self.engine.apply_action(session, participant, payload, now)?;

        let update = state_update(session)?;
        Ok(BroadcastRouter::new(&self.registry).to_session(session.participants(), &update))
    }

    /// Commit the current round to a category.
    ///
    /// Broadcasts `stateUpdate` on handoff, or `sessionComplete` followed by
    /// teardown when every category is filled.
    pub fn commit_result(
        &mut self,
        participant: ParticipantId,
        session_id: SessionId,
        category: &str,
        claimed: Option<u32>,
    ) -> Outcome<E> {
        let now = self.env.now();
        let session = self
            .sessions
            .get_mut(session_id)
            .filter(|s| s.is_member(participant))
            .ok_or(CoordinatorError::SessionNotFound(session_id))?;

        let outcome = self.engine.commit_result(session, participant, category, claimed, now)?;
        let members = session.participants();
        let router = BroadcastRouter::new(&self.registry);

        match outcome {
            CommitOutcome::Continued { .. } => {
                let update = state_update(session)?;
                Ok(router.to_session(members, &update))
            },
            CommitOutcome::Complete { winner, final_scores } => {
                let mut actions = router.to_session(members, &ServerMessage::SessionComplete {
                    session_id,
                    winner,
                    final_scores,
                });
                actions.extend(self.teardown(session_id, TeardownReason::Completed));
                Ok(actions)
            },
        }
    }

    /// Remove a session and return both live members to `Idle`.
    ///
    /// Members are not re-queued. Tearing down an unknown session is a no-op.
    pub fn teardown(&mut self, session_id: SessionId, reason: TeardownReason) -> Actions<E> {
        let Some(session) = self.sessions.remove(session_id) else {
            return Vec::new();
        };

        let members = session.participants();
        for member in members {
            if self.registry.status(member) == Some(ParticipantStatus::InSession(session_id)) {
                self.registry.set_status(member, ParticipantStatus::Idle);
            }
        }

        let router = BroadcastRouter::new(&self.registry);
        let mut actions = match reason {
            TeardownReason::Completed => Vec::new(),
            TeardownReason::Disconnected { departed } => session
                .opponent_of(departed)
                .and_then(|survivor| {
                    router.to_participant(survivor, ServerMessage::OpponentLeft { session_id })
                })
                .into_iter()
                .collect(),
            TeardownReason::TimedOut => router.to_session(members, &ServerMessage::SessionAborted {
                session_id,
                reason: AbortReason::TimedOut,
            }),
        };
        actions.push(self.log(LogLevel::Info, format!("{session_id} torn down: {reason:?}")));
        actions
    }

    /// Reclaim everything a departing participant holds, then free it.
    ///
    /// Idempotent: removing an unknown participant produces no actions.
    pub fn remove_participant(&mut self, participant: ParticipantId) -> Actions<E> {
        if self.registry.get(participant).is_none() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let was_waiting = self.pool.dequeue(participant);
        if let Some(session_id) = self.sessions.session_for(participant) {
            actions.extend(
                self.teardown(session_id, TeardownReason::Disconnected { departed: participant }),
            );
        }
        self.registry.remove(participant);

        if was_waiting {
            actions.extend(self.pool_update());
        }
        actions
    }

    /// Abort sessions idle longer than the configured turn timeout.
    pub fn tick(&mut self) -> Actions<E> {
        let Some(timeout) = self.config.turn_timeout else {
            return Vec::new();
        };

        let now = self.env.now();
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| now - s.last_activity() >= timeout)
            .map(Session::id)
            .collect();

        expired
            .into_iter()
            .flat_map(|session_id| self.teardown(session_id, TeardownReason::TimedOut))
            .collect()
    }

    fn pool_update(&self) -> Actions<E> {
        let message = ServerMessage::PoolUpdate { participants: self.pool.list(&self.registry) };
        BroadcastRouter::new(&self.registry).to_pool(&self.pool, &message)
    }

    fn reject(&self, connection_id: ConnectionId, err: &CoordinatorError) -> Actions<E> {
        vec![
            ServerAction::SendToConnection {
                connection_id,
                message: ServerMessage::Error(ErrorPayload::new(err.code(), err.to_string())),
            },
            self.log(LogLevel::Warn, format!("rejected request from {connection_id}: {err}")),
        ]
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction<E::Instant> {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// Identity registry.
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Waiting pool.
    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }

    /// Session store.
    pub fn sessions(&self) -> &SessionStore<R::RoundState, E::Instant> {
        &self.sessions
    }

    /// Rule module.
    pub fn rules(&self) -> &R {
        self.engine.rules()
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

fn encode_round<S: Serialize>(round: &S) -> Result<serde_json::Value, CoordinatorError> {
    serde_json::to_value(round).map_err(|e| CoordinatorError::Encoding(e.to_string()))
}

fn state_update<S: Serialize, I: Copy>(
    session: &Session<S, I>,
) -> Result<ServerMessage, CoordinatorError> {
    Ok(ServerMessage::StateUpdate {
        session_id: session.id(),
        round_state: encode_round(session.round_state())?,
        actor: session.actor(),
        turn_budget: session.turn_budget(),
        scores: session.score_cards(),
    })
}
