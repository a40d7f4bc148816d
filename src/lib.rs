//! Cultivation - idle progression engine
//!
//! Meditation accrues spirit power on a fixed tick, breakthroughs spend it
//! to climb sub-levels and realms, and cultivation methods bought with
//! spirit stones speed up accrual. Each player's state is owned by a single
//! session task and written through to a `ProgressionStore`.

pub mod breakthrough;
pub mod catalog;
pub mod core;
pub mod methods;
pub mod persistence;
pub mod session;
pub mod utils;

pub use catalog::Catalog;
pub use crate::core::config::EngineConfig;
pub use crate::core::error::EngineError;
pub use crate::core::state::{PlayerRecord, ProgressionState};
pub use persistence::{FileStore, MemoryStore, ProgressionStore, StorageError};
pub use session::{CultivationEngine, SessionHandle, SessionStatus};
