//! Session store.
//!
//! Owns every live two-participant session and a direct participant → session
//! index so membership lookups never scan. Sessions must be explicitly
//! inserted; ids come from a monotonic counter and are never reused.
//!
//! Generic over `S` (rule module round state) and `I` (Instant type) to
//! support virtual time in tests.

use std::collections::{BTreeMap, HashMap};

use rand_chacha::ChaCha8Rng;
use tandem_proto::{ParticipantId, ScoreCard, SessionId};
use thiserror::Error;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Turns are being played
    InProgress,
    /// Every category is filled for both participants
    Complete,
}

/// A two-participant session.
///
/// Seat 0 is the creator (inviter) and acts first.
#[derive(Debug, Clone)]
pub struct Session<S, I = std::time::Instant> {
    pub(crate) id: SessionId,
    pub(crate) participants: [ParticipantId; 2],
    pub(crate) actor_index: usize,
    pub(crate) turn_budget: u32,
    pub(crate) round_state: S,
    /// Per-seat category → score. Entries are never overwritten.
    pub(crate) results: [BTreeMap<String, u32>; 2],
    pub(crate) phase: Phase,
    /// Handed to the rule module for every action in this session
    pub(crate) rng: ChaCha8Rng,
    /// Last accepted action or commit
    pub(crate) last_activity: I,
}

impl<S, I: Copy> Session<S, I> {
    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Members in seat order.
    pub fn participants(&self) -> [ParticipantId; 2] {
        self.participants
    }

    /// Seat of the current actor (0 or 1).
    pub fn actor_index(&self) -> usize {
        self.actor_index
    }

    /// Participant whose turn it is.
    pub fn actor(&self) -> ParticipantId {
        self.participants[self.actor_index]
    }

    /// Budget-consuming actions left this turn.
    pub fn turn_budget(&self) -> u32 {
        self.turn_budget
    }

    /// Current round state.
    pub fn round_state(&self) -> &S {
        &self.round_state
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last accepted action or commit.
    pub fn last_activity(&self) -> I {
        self.last_activity
    }

    /// Seat of `participant`, if a member.
    pub fn seat_of(&self, participant: ParticipantId) -> Option<usize> {
        self.participants.iter().position(|&p| p == participant)
    }

    /// The other member of the session.
    pub fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        self.seat_of(participant).map(|seat| self.participants[1 - seat])
    }

    /// Whether `participant` is a member.
    pub fn is_member(&self, participant: ParticipantId) -> bool {
        self.seat_of(participant).is_some()
    }

    /// Accumulated results for a seat.
    pub fn results(&self, seat: usize) -> Option<&BTreeMap<String, u32>> {
        self.results.get(seat)
    }

    /// Sum of filled categories for a seat.
    pub fn total(&self, seat: usize) -> u32 {
        self.results.get(seat).map_or(0, sum_scores)
    }

    /// Score cards in seat order.
    pub fn score_cards(&self) -> Vec<ScoreCard> {
        self.participants
            .iter()
            .zip(&self.results)
            .map(|(&participant_id, categories)| ScoreCard {
                participant_id,
                categories: categories.clone(),
                total: sum_scores(categories),
            })
            .collect()
    }
}

/// Filled-category total. Commits never let it exceed `u32::MAX`.
fn sum_scores(categories: &BTreeMap<String, u32>) -> u32 {
    categories.values().fold(0, |total, &score| total.saturating_add(score))
}

/// Session store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// Participant is already indexed under another session
    #[error("participant {participant} is already in session {session}")]
    AlreadyInSession {
        /// Participant that conflicted
        participant: ParticipantId,
        /// Session it already belongs to
        session: SessionId,
    },

    /// Session id is already present
    #[error("session already exists: {0}")]
    SessionExists(SessionId),
}

/// Store of live sessions.
#[derive(Debug)]
pub struct SessionStore<S, I = std::time::Instant> {
    sessions: BTreeMap<SessionId, Session<S, I>>,
    /// Participant → session (reverse index)
    by_participant: HashMap<ParticipantId, SessionId>,
    next_id: u64,
}

impl<S, I> Default for SessionStore<S, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, I> SessionStore<S, I> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self { sessions: BTreeMap::new(), by_participant: HashMap::new(), next_id: 1 }
    }

    /// Reserve the next session id.
    pub fn allocate_id(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a session and index both members.
    ///
    /// Rejects the insert without side effects if either member is already
    /// indexed.
    pub fn insert(&mut self, session: Session<S, I>) -> Result<(), SessionStoreError> {
        if self.sessions.contains_key(&session.id) {
            return Err(SessionStoreError::SessionExists(session.id));
        }
        for participant in session.participants {
            if let Some(&existing) = self.by_participant.get(&participant) {
                return Err(SessionStoreError::AlreadyInSession { participant, session: existing });
            }
        }

        for participant in session.participants {
            self.by_participant.insert(participant, session.id);
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Remove a session and its index entries.
    pub fn remove(&mut self, id: SessionId) -> Option<Session<S, I>> {
        let session = self.sessions.remove(&id)?;
        for participant in session.participants {
            if self.by_participant.get(&participant) == Some(&id) {
                self.by_participant.remove(&participant);
            }
        }
        Some(session)
    }

    /// Session by id.
    pub fn get(&self, id: SessionId) -> Option<&Session<S, I>> {
        self.sessions.get(&id)
    }

    /// Mutable session by id.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session<S, I>> {
        self.sessions.get_mut(&id)
    }

    /// Session a participant belongs to.
    pub fn session_for(&self, participant: ParticipantId) -> Option<SessionId> {
        self.by_participant.get(&participant).copied()
    }

    /// All sessions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Session<S, I>> + '_ {
        self.sessions.values()
    }

    /// All participant → session index entries.
    pub fn index(&self) -> impl Iterator<Item = (ParticipantId, SessionId)> + '_ {
        self.by_participant.iter().map(|(&p, &s)| (p, s))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn session(store: &mut SessionStore<(), u64>, a: u64, b: u64) -> Session<(), u64> {
        Session {
            id: store.allocate_id(),
            participants: [ParticipantId(a), ParticipantId(b)],
            actor_index: 0,
            turn_budget: 3,
            round_state: (),
            results: [BTreeMap::new(), BTreeMap::new()],
            phase: Phase::InProgress,
            rng: ChaCha8Rng::seed_from_u64(0),
            last_activity: 0,
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let mut store: SessionStore<(), u64> = SessionStore::new();

        assert_eq!(store.allocate_id(), SessionId(1));
        assert_eq!(store.allocate_id(), SessionId(2));
    }

    #[test]
    fn insert_indexes_both_members() {
        let mut store = SessionStore::new();
        let s = session(&mut store, 1, 2);
        let id = s.id;

        store.insert(s).unwrap();

        assert_eq!(store.session_for(ParticipantId(1)), Some(id));
        assert_eq!(store.session_for(ParticipantId(2)), Some(id));
        assert_eq!(store.get(id).unwrap().actor(), ParticipantId(1));
    }

    #[test]
    fn insert_rejects_participant_in_another_session() {
        let mut store = SessionStore::new();
        let first = session(&mut store, 1, 2);
        let first_id = first.id;
        store.insert(first).unwrap();

        let second = session(&mut store, 3, 2);
        let result = store.insert(second);

        assert_eq!(
            result,
            Err(SessionStoreError::AlreadyInSession {
                participant: ParticipantId(2),
                session: first_id,
            })
        );
        assert!(store.session_for(ParticipantId(3)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_clears_index() {
        let mut store = SessionStore::new();
        let s = session(&mut store, 1, 2);
        let id = s.id;
        store.insert(s).unwrap();

        assert!(store.remove(id).is_some());

        assert!(store.session_for(ParticipantId(1)).is_none());
        assert!(store.session_for(ParticipantId(2)).is_none());
        assert_eq!(store.index().count(), 0);
        assert!(store.remove(id).is_none());
    }

    #[test]
    fn score_cards_follow_seat_order() {
        let mut store = SessionStore::new();
        let mut s = session(&mut store, 7, 3);
        s.results[0].insert("chance".to_string(), 20);
        s.results[1].insert("chance".to_string(), 12);
        s.results[1].insert("ones".to_string(), 3);

        let cards = s.score_cards();

        assert_eq!(cards[0].participant_id, ParticipantId(7));
        assert_eq!(cards[0].total, 20);
        assert_eq!(cards[1].participant_id, ParticipantId(3));
        assert_eq!(cards[1].total, 15);
        assert_eq!(s.opponent_of(ParticipantId(3)), Some(ParticipantId(7)));
        assert_eq!(s.opponent_of(ParticipantId(9)), None);
    }
}
