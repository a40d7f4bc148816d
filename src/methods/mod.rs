//! Cultivation methods: costs, accrual multiplier and the shop operations.

pub mod logic;
pub mod types;

pub use logic::*;
pub use types::*;
