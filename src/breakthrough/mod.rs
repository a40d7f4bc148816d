//! Breakthrough state machine: minor sub-level steps and probabilistic
//! major tier advancement.

pub mod logic;
pub mod types;

pub use logic::*;
pub use types::*;
