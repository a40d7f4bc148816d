//! Storage collaborator for player records.
//!
//! The engine only needs three operations: load a record, write a whole
//! record atomically, and blind-overwrite the meditation snapshot fields.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use crate::core::state::{MeditationSnapshot, PlayerRecord};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt save: {0}")]
    Corrupt(String),

    #[error("could not encode record: {0}")]
    Encode(String),

    #[error("no stored record for player {0}")]
    MissingRecord(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Where progression records live. Implementations must make each call
/// atomic on its own; no cross-call transaction is assumed.
pub trait ProgressionStore: Send + Sync {
    /// The stored record, or `None` for a player that was never onboarded.
    fn load(&self, user_id: &str) -> Result<Option<PlayerRecord>, StorageError>;

    /// Replace the whole record (progression and owned methods) in one write.
    fn save_record(&self, record: &PlayerRecord) -> Result<(), StorageError>;

    /// Overwrite power, stones, meditating flag and timestamp. No merge.
    fn write_snapshot(&self, snapshot: &MeditationSnapshot) -> Result<(), StorageError>;
}
