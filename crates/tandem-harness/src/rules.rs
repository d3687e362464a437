//! Tally rule module.
//!
//! Deterministic game for coordinator tests: the actor adds positive amounts
//! to a running tally (each add spends budget) and commits the tally to any
//! category. Outcomes depend only on what the test sends, so scenarios can
//! script exact totals and winners.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tandem_core::{RuleModule, RuleViolation};

/// Round state: the running tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyRound {
    /// Sum of amounts added this turn
    pub total: u32,
    /// Number of adds this turn
    pub adds: u32,
}

/// Tally actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TallyAction {
    /// Add to the tally. Spends one unit of budget; zero is illegal.
    Add {
        /// Amount to add
        amount: u32,
    },
    /// Look without changing anything. Free.
    Peek,
}

/// Tally rules with configurable categories and allowance.
#[derive(Debug, Clone)]
pub struct TallyRules {
    categories: Vec<String>,
    allowance: u32,
}

impl TallyRules {
    /// Rules with the given categories and per-turn allowance.
    pub fn new(categories: &[&str], allowance: u32) -> Self {
        Self { categories: categories.iter().map(|c| (*c).to_string()).collect(), allowance }
    }
}

impl Default for TallyRules {
    /// Two categories, three adds per turn.
    fn default() -> Self {
        Self::new(&["first", "second"], 3)
    }
}

impl RuleModule for TallyRules {
    type Action = TallyAction;
    type RoundState = TallyRound;

    fn turn_allowance(&self) -> u32 {
        self.allowance
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }

    fn fresh_round(&self) -> TallyRound {
        TallyRound::default()
    }

    fn consumes_budget(&self, action: &TallyAction) -> bool {
        matches!(action, TallyAction::Add { .. })
    }

    fn apply(
        &self,
        round: &TallyRound,
        action: &TallyAction,
        _rng: &mut dyn RngCore,
    ) -> Result<TallyRound, RuleViolation> {
        match *action {
            TallyAction::Add { amount: 0 } => Err(RuleViolation::new("amount must be positive")),
            TallyAction::Add { amount } => Ok(TallyRound {
                total: round.total.saturating_add(amount),
                adds: round.adds + 1,
            }),
            TallyAction::Peek => Ok(round.clone()),
        }
    }

    fn score(&self, round: &TallyRound, _category: &str) -> Result<u32, RuleViolation> {
        Ok(round.total)
    }
}

/// JSON payload for [`TallyAction::Add`].
pub fn add(amount: u32) -> serde_json::Value {
    serde_json::json!({ "kind": "add", "amount": amount })
}

/// JSON payload for [`TallyAction::Peek`].
pub fn peek() -> serde_json::Value {
    serde_json::json!({ "kind": "peek" })
}
