//! Fuzz target for the five-dice rule module
//!
//! # Strategy
//!
//! - Arbitrary roll/hold sequences from a fresh round
//! - Every category scored after every accepted action
//!
//! # Invariants
//!
//! - Faces always stay within 1..=6 once rolled
//! - Held dice NEVER change on a roll
//! - Roll count never exceeds the number of accepted rolls
//! - Scoring accepts every known category once rolled and rejects before

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tandem_core::{DiceAction, DiceRules, RuleModule};

#[derive(Debug, Arbitrary)]
enum Step {
    Roll,
    Hold { die: u8, held: bool },
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    steps: Vec<Step>,
}

fuzz_target!(|scenario: Scenario| {
    let rules = DiceRules::standard();
    let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
    let mut round = rules.fresh_round();
    let mut rolls = 0;

    for step in scenario.steps.iter().take(64) {
        let action = match *step {
            Step::Roll => DiceAction::Roll,
            Step::Hold { die, held } => DiceAction::Hold { die: usize::from(die % 7), held },
        };

        let Ok(next) = rules.apply(&round, &action, &mut rng) else {
            continue;
        };

        if matches!(action, DiceAction::Roll) {
            rolls += 1;
            for i in 0..round.dice.len() {
                if round.held[i] {
                    assert_eq!(next.dice[i], round.dice[i], "held die {i} changed");
                }
                assert!((1..=6).contains(&next.dice[i]));
            }
        }
        assert_eq!(next.rolls, rolls);
        round = next;

        for category in rules.categories() {
            assert!(rules.score(&round, category).is_ok());
        }
    }

    if rolls == 0 {
        for category in rules.categories() {
            assert!(rules.score(&round, category).is_err());
        }
    }
});
