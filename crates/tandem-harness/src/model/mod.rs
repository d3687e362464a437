//! Model-based testing support.
//!
//! [`Operation`]s describe client requests and runtime events; [`SimWorld`]
//! applies them to a simulation server so properties can be checked after
//! every step.

mod operation;
mod world;

pub use operation::{ClientId, NAMES, Operation};
pub use world::{OperationResult, SimWorld};
