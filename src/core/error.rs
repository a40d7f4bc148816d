//! Error types returned by engine operations.

use crate::persistence::StorageError;
use std::fmt;
use thiserror::Error;

/// The two spendable resources a player holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    SpiritPower,
    SpiritStones,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::SpiritPower => write!(f, "spirit power"),
            Resource::SpiritStones => write!(f, "spirit stones"),
        }
    }
}

/// Requests that are well-formed but not allowed from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("already at the peak of the final tier")]
    MaxTier,
    #[error("method is already at its max level")]
    MaxLevel,
    #[error("method has already been learned")]
    AlreadyOwned,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not enough {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource: Resource,
        required: u64,
        available: u64,
    },

    #[error("invalid transition: {0}")]
    InvalidTransition(InvalidTransition),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StorageError),

    #[error("player {user_id} has too many pending operations")]
    ConcurrencyViolation { user_id: String },

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("no progression record for player {0}")]
    UnknownPlayer(String),

    #[error("session for player {0} has shut down")]
    SessionClosed(String),
}

impl From<InvalidTransition> for EngineError {
    fn from(value: InvalidTransition) -> Self {
        EngineError::InvalidTransition(value)
    }
}

impl EngineError {
    /// True for failures the player can fix by accruing more resources.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::InsufficientResource { .. })
    }
}
