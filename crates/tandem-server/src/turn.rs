//! Turn engine.
//!
//! Per-session state machine driving the rule module:
//!
//! ```text
//! AwaitingAction(actor) ──action──► ActionApplied ──► AwaitingAction(actor)
//!         │
//!         └──commit──► AwaitingAction(other) ... ──► Complete
//! ```
//!
//! The engine mutates a [`Session`] in place and never performs I/O. Every
//! rejection leaves the session exactly as it was.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tandem_core::{RuleModule, RuleViolation};
use tandem_proto::{ErrorCode, ParticipantId, ScoreCard, SessionId};
use thiserror::Error;

use crate::session_store::{Phase, Session};

/// Reasons the turn engine rejects a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// Sender is not a member of the session
    #[error("participant {0} is not a member of this session")]
    NotAMember(ParticipantId),

    /// Sender is not the current actor
    #[error("it is {actor}'s turn")]
    NotYourTurn {
        /// Current actor
        actor: ParticipantId,
    },

    /// No budget-consuming actions left this turn
    #[error("no actions left this turn")]
    BudgetExhausted,

    /// Rule module refused the action or could not score the round
    #[error("{0}")]
    IllegalAction(String),

    /// Category is not scored by this game
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Category already holds a result for the sender
    #[error("category already filled: {0}")]
    CategoryAlreadyFilled(String),

    /// Client's claimed score differs from the computed one
    #[error("claimed score {claimed} does not match computed score {computed}")]
    ScoreMismatch {
        /// Score sent by the client
        claimed: u32,
        /// Score computed from the round state
        computed: u32,
    },

    /// Session already finished
    #[error("session is complete")]
    SessionComplete,
}

impl From<RuleViolation> for TurnError {
    fn from(violation: RuleViolation) -> Self {
        Self::IllegalAction(violation.reason)
    }
}

impl TurnError {
    /// Wire error code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotAMember(_) | Self::SessionComplete => ErrorCode::SessionNotFound,
            Self::NotYourTurn { .. } => ErrorCode::NotYourTurn,
            Self::BudgetExhausted => ErrorCode::BudgetExhausted,
            Self::IllegalAction(_) => ErrorCode::IllegalAction,
            Self::UnknownCategory(_) => ErrorCode::UnknownCategory,
            Self::CategoryAlreadyFilled(_) => ErrorCode::CategoryAlreadyFilled,
            Self::ScoreMismatch { .. } => ErrorCode::ScoreMismatch,
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Turn handed to the other participant
    Continued {
        /// Score recorded for the committed category
        score: u32,
    },
    /// Every category is filled for both participants
    Complete {
        /// Strictly higher total, `None` on a draw
        winner: Option<ParticipantId>,
        /// Final score cards in seat order
        final_scores: Vec<ScoreCard>,
    },
}

/// Drives sessions through their turns using a rule module.
#[derive(Debug)]
pub struct TurnEngine<R> {
    rules: R,
}

impl<R: RuleModule> TurnEngine<R> {
    /// Create an engine for the given rules.
    pub fn new(rules: R) -> Self {
        Self { rules }
    }

    /// The rule module.
    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// Build a fresh session. Seat 0 acts first.
    pub fn open_session<I: Copy>(
        &self,
        id: SessionId,
        participants: [ParticipantId; 2],
        seed: u64,
        now: I,
    ) -> Session<R::RoundState, I> {
        Session {
            id,
            participants,
            actor_index: 0,
            turn_budget: self.rules.turn_allowance(),
            round_state: self.rules.fresh_round(),
            results: [BTreeMap::new(), BTreeMap::new()],
            phase: Phase::InProgress,
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_activity: now,
        }
    }

    /// Apply an action from `participant`.
    ///
    /// Checks run in order: membership, turn, payload decoding, budget, rule
    /// legality. On success the round state is replaced and the budget is
    /// decremented if the action consumes it.
    pub fn apply_action<I: Copy>(
        &self,
        session: &mut Session<R::RoundState, I>,
        participant: ParticipantId,
        payload: &serde_json::Value,
        now: I,
    ) -> Result<(), TurnError> {
        self.check_actor(session, participant)?;

        let action: R::Action = serde_json::from_value(payload.clone())
            .map_err(|e| TurnError::IllegalAction(format!("invalid action payload: {e}")))?;

        let consumes = self.rules.consumes_budget(&action);
        if consumes && session.turn_budget == 0 {
            return Err(TurnError::BudgetExhausted);
        }

        let next = self.rules.apply(&session.round_state, &action, &mut session.rng)?;

        session.round_state = next;
        if consumes {
            session.turn_budget -= 1;
        }
        session.last_activity = now;
        Ok(())
    }

    /// Commit the current round to `category` for `participant`.
    ///
    /// The score is computed from the round state; `claimed`, when present,
    /// must match it. On success the turn passes to the other participant
    /// with a fresh round and full budget, unless every category is now
    /// filled for both seats.
    pub fn commit_result<I: Copy>(
        &self,
        session: &mut Session<R::RoundState, I>,
        participant: ParticipantId,
        category: &str,
        claimed: Option<u32>,
        now: I,
    ) -> Result<CommitOutcome, TurnError> {
        let seat = self.check_actor(session, participant)?;

        if !self.rules.has_category(category) {
            return Err(TurnError::UnknownCategory(category.to_string()));
        }
        if session.results[seat].contains_key(category) {
            return Err(TurnError::CategoryAlreadyFilled(category.to_string()));
        }

        let computed = self.rules.score(&session.round_state, category)?;
        if let Some(claimed) = claimed
            && claimed != computed
        {
            return Err(TurnError::ScoreMismatch { claimed, computed });
        }
        if session.total(seat).checked_add(computed).is_none() {
            return Err(TurnError::IllegalAction(format!(
                "score {computed} would overflow the running total"
            )));
        }

        session.results[seat].insert(category.to_string(), computed);
        session.last_activity = now;

        if self.all_filled(session) {
            session.phase = Phase::Complete;
            let winner = match session.total(0).cmp(&session.total(1)) {
                std::cmp::Ordering::Greater => Some(session.participants[0]),
                std::cmp::Ordering::Less => Some(session.participants[1]),
                std::cmp::Ordering::Equal => None,
            };
            return Ok(CommitOutcome::Complete { winner, final_scores: session.score_cards() });
        }

        session.actor_index = 1 - session.actor_index;
        session.turn_budget = self.rules.turn_allowance();
        session.round_state = self.rules.fresh_round();
        Ok(CommitOutcome::Continued { score: computed })
    }

    fn check_actor<I: Copy>(
        &self,
        session: &Session<R::RoundState, I>,
        participant: ParticipantId,
    ) -> Result<usize, TurnError> {
        let seat = session.seat_of(participant).ok_or(TurnError::NotAMember(participant))?;
        if session.phase == Phase::Complete {
            return Err(TurnError::SessionComplete);
        }
        if seat != session.actor_index {
            return Err(TurnError::NotYourTurn { actor: session.actor() });
        }
        Ok(seat)
    }

    fn all_filled<I>(&self, session: &Session<R::RoundState, I>) -> bool {
        let categories = self.rules.categories();
        session.results.iter().all(|r| categories.iter().all(|c| r.contains_key(c)))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    /// Counter game: `bump` adds one (costs budget), `look` is free, `bad` is
    /// refused. Every category scores the counter.
    struct Counter {
        categories: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "kind", rename_all = "camelCase")]
    enum CounterAction {
        Bump,
        Look,
        Bad,
    }

    impl RuleModule for Counter {
        type Action = CounterAction;
        type RoundState = u32;

        fn turn_allowance(&self) -> u32 {
            2
        }

        fn categories(&self) -> &[String] {
            &self.categories
        }

        fn fresh_round(&self) -> u32 {
            0
        }

        fn consumes_budget(&self, action: &CounterAction) -> bool {
            matches!(action, CounterAction::Bump)
        }

        fn apply(
            &self,
            round: &u32,
            action: &CounterAction,
            _rng: &mut dyn rand::RngCore,
        ) -> Result<u32, RuleViolation> {
            match action {
                CounterAction::Bump => Ok(round + 1),
                CounterAction::Look => Ok(*round),
                CounterAction::Bad => Err(RuleViolation::new("not allowed")),
            }
        }

        fn score(&self, round: &u32, _category: &str) -> Result<u32, RuleViolation> {
            Ok(*round)
        }
    }

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);

    fn engine(categories: &[&str]) -> TurnEngine<Counter> {
        TurnEngine::new(Counter { categories: categories.iter().map(|c| (*c).to_string()).collect() })
    }

    fn open(engine: &TurnEngine<Counter>) -> Session<u32, u64> {
        engine.open_session(SessionId(1), [A, B], 7, 0)
    }

    #[test]
    fn creator_acts_first_with_full_budget() {
        let engine = engine(&["x"]);
        let session = open(&engine);

        assert_eq!(session.actor(), A);
        assert_eq!(session.turn_budget(), 2);
        assert_eq!(*session.round_state(), 0);
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[test]
    fn action_from_non_actor_is_rejected() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        let result = engine.apply_action(&mut session, B, &json!({"kind": "bump"}), 1);

        assert_eq!(result, Err(TurnError::NotYourTurn { actor: A }));
        assert_eq!(*session.round_state(), 0);
        assert_eq!(session.turn_budget(), 2);
    }

    #[test]
    fn consuming_action_decrements_budget() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 5).unwrap();

        assert_eq!(*session.round_state(), 1);
        assert_eq!(session.turn_budget(), 1);
        assert_eq!(session.last_activity(), 5);
        assert_eq!(session.actor(), A);
    }

    #[test]
    fn free_action_keeps_budget() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "look"}), 1).unwrap();

        assert_eq!(session.turn_budget(), 2);
    }

    #[test]
    fn exhausted_budget_rejects_consuming_action_only() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 1).unwrap();
        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 2).unwrap();

        let result = engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 3);
        assert_eq!(result, Err(TurnError::BudgetExhausted));
        assert_eq!(*session.round_state(), 2);

        assert!(engine.apply_action(&mut session, A, &json!({"kind": "look"}), 4).is_ok());
    }

    #[test]
    fn rule_violation_carries_reason() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        let result = engine.apply_action(&mut session, A, &json!({"kind": "bad"}), 1);

        assert_eq!(result, Err(TurnError::IllegalAction("not allowed".to_string())));
        assert_eq!(result.unwrap_err().code(), ErrorCode::IllegalAction);
    }

    #[test]
    fn undecodable_payload_is_illegal() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        let result = engine.apply_action(&mut session, A, &json!({"kind": "fly"}), 1);

        assert!(matches!(result, Err(TurnError::IllegalAction(_))));
    }

    #[test]
    fn commit_hands_turn_over_and_resets_round() {
        let engine = engine(&["x", "y"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 1).unwrap();
        let outcome = engine.commit_result(&mut session, A, "x", None, 2).unwrap();

        assert_eq!(outcome, CommitOutcome::Continued { score: 1 });
        assert_eq!(session.actor(), B);
        assert_eq!(session.turn_budget(), 2);
        assert_eq!(*session.round_state(), 0);
        assert_eq!(session.results(0).unwrap().get("x"), Some(&1));
    }

    #[test]
    fn commit_checks_run_in_order() {
        let engine = engine(&["x", "y"]);
        let mut session = open(&engine);

        assert_eq!(
            engine.commit_result(&mut session, B, "nope", None, 1),
            Err(TurnError::NotYourTurn { actor: A })
        );
        assert_eq!(
            engine.commit_result(&mut session, A, "nope", None, 1),
            Err(TurnError::UnknownCategory("nope".to_string()))
        );
        assert_eq!(
            engine.commit_result(&mut session, A, "x", Some(9), 1),
            Err(TurnError::ScoreMismatch { claimed: 9, computed: 0 })
        );
        assert_eq!(session.actor(), A);
        assert!(session.results(0).unwrap().is_empty());
    }

    #[test]
    fn filled_category_is_never_overwritten() {
        let engine = engine(&["x", "y"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 1).unwrap();
        engine.commit_result(&mut session, A, "x", Some(1), 1).unwrap();
        engine.commit_result(&mut session, B, "x", None, 2).unwrap();

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 3).unwrap();
        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 3).unwrap();
        let result = engine.commit_result(&mut session, A, "x", None, 4);

        assert_eq!(result, Err(TurnError::CategoryAlreadyFilled("x".to_string())));
        assert_eq!(session.results(0).unwrap().get("x"), Some(&1));
        assert_eq!(session.actor(), A);
    }

    #[test]
    fn higher_total_wins() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.apply_action(&mut session, A, &json!({"kind": "bump"}), 1).unwrap();
        engine.commit_result(&mut session, A, "x", None, 1).unwrap();
        let outcome = engine.commit_result(&mut session, B, "x", None, 2).unwrap();

        let CommitOutcome::Complete { winner, final_scores } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(winner, Some(A));
        assert_eq!(final_scores[0].total, 1);
        assert_eq!(final_scores[1].total, 0);
        assert_eq!(session.phase(), Phase::Complete);
    }

    #[test]
    fn equal_totals_draw() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.commit_result(&mut session, A, "x", None, 1).unwrap();
        let outcome = engine.commit_result(&mut session, B, "x", None, 2).unwrap();

        assert!(matches!(outcome, CommitOutcome::Complete { winner: None, .. }));
    }

    #[test]
    fn completed_session_rejects_further_input() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        engine.commit_result(&mut session, A, "x", None, 1).unwrap();
        engine.commit_result(&mut session, B, "x", None, 2).unwrap();

        let result = engine.apply_action(&mut session, B, &json!({"kind": "look"}), 3);
        assert_eq!(result, Err(TurnError::SessionComplete));
    }

    #[test]
    fn outsider_is_not_a_member() {
        let engine = engine(&["x"]);
        let mut session = open(&engine);

        let result = engine.apply_action(&mut session, ParticipantId(9), &json!({"kind": "look"}), 1);
        assert_eq!(result, Err(TurnError::NotAMember(ParticipantId(9))));
    }
}
