//! Core progression state, configuration, errors and the meditation tick.

#![allow(unused_imports)]

pub mod config;
pub mod constants;
pub mod error;
pub mod state;
pub mod tick;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use state::*;
pub use tick::*;
