//! Per-player serialization boundary.
//!
//! Every operation for a player runs inside that player's session task, one
//! at a time. Different players run fully in parallel.

pub mod engine;
pub mod handle;
pub mod player;
pub mod sync;

pub use engine::CultivationEngine;
pub use handle::{BreakthroughReport, MethodReport, SessionHandle, SessionStatus};
pub use player::spawn_session;
pub use sync::PersistenceSynchronizer;
