//! Reference rule module: a five-dice category game.
//!
//! Each turn the actor may roll up to three times, holding any dice between
//! rolls, then must fill one of thirteen categories with the current dice.
//! Holding is free; only rolls spend turn budget.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{error::RuleViolation, rules::RuleModule};

/// Number of dice in play.
pub const DICE: usize = 5;

/// Rolls allowed per turn.
pub const ROLLS_PER_TURN: u32 = 3;

const CATEGORY_NAMES: [&str; 13] = [
    "ones",
    "twos",
    "threes",
    "fours",
    "fives",
    "sixes",
    "threeOfAKind",
    "fourOfAKind",
    "fullHouse",
    "smallStraight",
    "largeStraight",
    "yahtzee",
    "chance",
];

/// Dice visible during a turn. A face of `0` means "not rolled yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRound {
    /// Current faces, 1-6 once rolled
    pub dice: [u8; DICE],
    /// Dice kept aside from the next roll
    pub held: [bool; DICE],
    /// Rolls taken this turn
    pub rolls: u32,
}

impl DiceRound {
    fn counts(&self) -> [u8; 7] {
        let mut counts = [0u8; 7];
        for &face in &self.dice {
            counts[face as usize] += 1;
        }
        counts
    }

    fn sum(&self) -> u32 {
        self.dice.iter().map(|&d| u32::from(d)).sum()
    }

    fn has_run(&self, len: usize) -> bool {
        let counts = self.counts();
        (1..=7 - len).any(|start| (start..start + len).all(|face| counts[face] > 0))
    }
}

/// Actions accepted by [`DiceRules`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiceAction {
    /// Re-roll every die that is not held.
    Roll,
    /// Hold or release one die.
    Hold {
        /// Die index, 0-4
        die: usize,
        /// New hold flag
        held: bool,
    },
}

/// Five dice, three rolls, thirteen categories.
#[derive(Debug, Clone)]
pub struct DiceRules {
    categories: Vec<String>,
}

impl DiceRules {
    /// The standard thirteen-category game.
    pub fn standard() -> Self {
        Self { categories: CATEGORY_NAMES.iter().map(|c| (*c).to_string()).collect() }
    }
}

impl Default for DiceRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleModule for DiceRules {
    type Action = DiceAction;
    type RoundState = DiceRound;

    fn turn_allowance(&self) -> u32 {
        ROLLS_PER_TURN
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }

    fn fresh_round(&self) -> DiceRound {
        DiceRound { dice: [0; DICE], held: [false; DICE], rolls: 0 }
    }

    fn consumes_budget(&self, action: &DiceAction) -> bool {
        matches!(action, DiceAction::Roll)
    }

    fn apply(
        &self,
        round: &DiceRound,
        action: &DiceAction,
        rng: &mut dyn RngCore,
    ) -> Result<DiceRound, RuleViolation> {
        let mut next = round.clone();
        match *action {
            DiceAction::Roll => {
                for (face, held) in next.dice.iter_mut().zip(next.held) {
                    if !held {
                        *face = rng.gen_range(1..=6);
                    }
                }
                next.rolls += 1;
            },
            DiceAction::Hold { die, held } => {
                if round.rolls == 0 {
                    return Err(RuleViolation::new("cannot hold dice before the first roll"));
                }
                let slot = next
                    .held
                    .get_mut(die)
                    .ok_or_else(|| RuleViolation::new(format!("no die at index {die}")))?;
                *slot = held;
            },
        }
        Ok(next)
    }

    fn score(&self, round: &DiceRound, category: &str) -> Result<u32, RuleViolation> {
        if round.rolls == 0 {
            return Err(RuleViolation::new("roll the dice before scoring"));
        }

        let counts = round.counts();
        let max_count = counts[1..].iter().copied().max().unwrap_or(0);
        let face_total = |face: u8| u32::from(counts[face as usize]) * u32::from(face);

        let score = match category {
            "ones" => face_total(1),
            "twos" => face_total(2),
            "threes" => face_total(3),
            "fours" => face_total(4),
            "fives" => face_total(5),
            "sixes" => face_total(6),
            "threeOfAKind" if max_count >= 3 => round.sum(),
            "fourOfAKind" if max_count >= 4 => round.sum(),
            "fullHouse" if counts.contains(&3) && counts.contains(&2) => 25,
            "smallStraight" if round.has_run(4) => 30,
            "largeStraight" if round.has_run(5) => 40,
            "yahtzee" if max_count == 5 => 50,
            "chance" => round.sum(),
            "threeOfAKind" | "fourOfAKind" | "fullHouse" | "smallStraight" | "largeStraight"
            | "yahtzee" => 0,
            other => return Err(RuleViolation::new(format!("unknown category: {other}"))),
        };
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn rolled(dice: [u8; DICE]) -> DiceRound {
        DiceRound { dice, held: [false; DICE], rolls: 1 }
    }

    #[test]
    fn standard_game_has_thirteen_categories() {
        let rules = DiceRules::standard();
        assert_eq!(rules.categories().len(), 13);
        assert!(rules.has_category("fullHouse"));
        assert!(!rules.has_category("bonus"));
    }

    #[test]
    fn only_rolls_consume_budget() {
        let rules = DiceRules::standard();
        assert!(rules.consumes_budget(&DiceAction::Roll));
        assert!(!rules.consumes_budget(&DiceAction::Hold { die: 0, held: true }));
    }

    #[test]
    fn upper_section_counts_matching_faces() {
        let rules = DiceRules::standard();
        let round = rolled([6, 6, 2, 6, 1]);
        assert_eq!(rules.score(&round, "sixes").unwrap(), 18);
        assert_eq!(rules.score(&round, "ones").unwrap(), 1);
        assert_eq!(rules.score(&round, "fives").unwrap(), 0);
    }

    #[test]
    fn lower_section_patterns() {
        let rules = DiceRules::standard();
        assert_eq!(rules.score(&rolled([3, 3, 3, 5, 5]), "fullHouse").unwrap(), 25);
        assert_eq!(rules.score(&rolled([3, 3, 3, 5, 5]), "threeOfAKind").unwrap(), 19);
        assert_eq!(rules.score(&rolled([3, 3, 3, 5, 5]), "fourOfAKind").unwrap(), 0);
        assert_eq!(rules.score(&rolled([1, 2, 3, 4, 6]), "smallStraight").unwrap(), 30);
        assert_eq!(rules.score(&rolled([1, 2, 3, 4, 6]), "largeStraight").unwrap(), 0);
        assert_eq!(rules.score(&rolled([2, 3, 4, 5, 6]), "largeStraight").unwrap(), 40);
        assert_eq!(rules.score(&rolled([4, 4, 4, 4, 4]), "yahtzee").unwrap(), 50);
        assert_eq!(rules.score(&rolled([4, 4, 4, 4, 4]), "fullHouse").unwrap(), 0);
        assert_eq!(rules.score(&rolled([1, 1, 2, 2, 6]), "chance").unwrap(), 12);
    }

    #[test]
    fn scoring_requires_a_roll() {
        let rules = DiceRules::standard();
        let result = rules.score(&rules.fresh_round(), "chance");
        assert!(result.is_err());
    }

    #[test]
    fn hold_before_roll_is_rejected() {
        let rules = DiceRules::standard();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result =
            rules.apply(&rules.fresh_round(), &DiceAction::Hold { die: 0, held: true }, &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn hold_out_of_range_is_rejected() {
        let rules = DiceRules::standard();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = rules.apply(&rolled([1; DICE]), &DiceAction::Hold { die: 5, held: true }, &mut rng);
        assert_eq!(result, Err(RuleViolation::new("no die at index 5")));
    }

    #[test]
    fn action_payloads_decode_from_json() {
        let roll: DiceAction = serde_json::from_str(r#"{"kind":"roll"}"#).unwrap();
        assert_eq!(roll, DiceAction::Roll);

        let hold: DiceAction = serde_json::from_str(r#"{"kind":"hold","die":2,"held":true}"#).unwrap();
        assert_eq!(hold, DiceAction::Hold { die: 2, held: true });
    }

    proptest! {
        /// Property: rolling keeps held dice and lands every other die on 1-6
        #[test]
        fn prop_roll_respects_holds(
            seed in any::<u64>(),
            dice in prop::array::uniform5(1u8..=6),
            held in prop::array::uniform5(any::<bool>()),
        ) {
            let rules = DiceRules::standard();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let round = DiceRound { dice, held, rolls: 1 };

            let next = rules.apply(&round, &DiceAction::Roll, &mut rng)?;

            prop_assert_eq!(next.rolls, 2);
            for i in 0..DICE {
                prop_assert!((1..=6).contains(&next.dice[i]));
                if held[i] {
                    prop_assert_eq!(next.dice[i], dice[i]);
                }
            }
        }

        /// Property: chance always equals the face sum
        #[test]
        fn prop_chance_is_face_sum(dice in prop::array::uniform5(1u8..=6)) {
            let rules = DiceRules::standard();
            let expected: u32 = dice.iter().map(|&d| u32::from(d)).sum();
            prop_assert_eq!(rules.score(&rolled(dice), "chance")?, expected);
        }
    }
}
