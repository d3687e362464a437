//! Tandem core abstractions.
//!
//! Pure, I/O-free building blocks shared by the server and the simulation
//! harness:
//!
//! - [`env::Environment`]: time and randomness, swappable for deterministic
//!   simulation
//! - [`rules::RuleModule`]: the game-specific collaborator that decides action
//!   legality and scoring
//! - [`dice::DiceRules`]: reference five-dice category game

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dice;
pub mod env;
pub mod error;
pub mod rules;

pub use dice::{DiceAction, DiceRound, DiceRules};
pub use env::Environment;
pub use error::RuleViolation;
pub use rules::RuleModule;
