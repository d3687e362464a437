//! Rule module interface.
//!
//! The coordinator owns turn order, budgets and result bookkeeping; the rule
//! module owns everything game-specific: what a round looks like, which
//! actions are legal, and what a round is worth in each category. Rule modules
//! are synchronous and side-effect free apart from the RNG they are handed.

use std::fmt;

use rand::RngCore;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::RuleViolation;

/// Game-specific legality and scoring.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `apply` and `score` are pure functions of their inputs and the RNG
/// - `categories()` returns the same, duplicate-free list on every call
/// - `fresh_round()` is the state shown at the start of every turn
pub trait RuleModule: Send + Sync + 'static {
    /// Transient per-turn state broadcast to both members.
    type RoundState: Clone + fmt::Debug + Serialize + Send + Sync;

    /// Decoded form of a client's `action` payload.
    type Action: DeserializeOwned + fmt::Debug;

    /// Budget-consuming actions allowed per turn.
    fn turn_allowance(&self) -> u32;

    /// Scoring categories each participant must fill.
    fn categories(&self) -> &[String];

    /// Round state at the start of a turn.
    fn fresh_round(&self) -> Self::RoundState;

    /// Whether `action` spends one unit of turn budget.
    fn consumes_budget(&self, action: &Self::Action) -> bool;

    /// Compute the round state after `action`, or reject it.
    fn apply(
        &self,
        round: &Self::RoundState,
        action: &Self::Action,
        rng: &mut dyn RngCore,
    ) -> Result<Self::RoundState, RuleViolation>;

    /// Score the round in `category`. `category` is always one of
    /// [`RuleModule::categories`].
    fn score(&self, round: &Self::RoundState, category: &str) -> Result<u32, RuleViolation>;

    /// Whether `category` is scored by this game.
    fn has_category(&self, category: &str) -> bool {
        self.categories().iter().any(|c| c == category)
    }
}
