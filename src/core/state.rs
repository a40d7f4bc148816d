//! Per-player progression state.

use super::constants::{MAX_BREAKTHROUGH_BONUS, MAX_SUB_LEVEL, MIN_SUB_LEVEL};
use crate::methods::types::OwnedMethod;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A player's cultivation progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub user_id: String,
    pub tier_id: String,
    /// Sub-level within the current tier, 1-9
    pub current_level: u32,
    pub spirit_power: u64,
    pub spirit_stones: u64,
    /// Percentage points added to major breakthrough odds, 0-100
    pub breakthrough_bonus: u32,
    pub is_meditating: bool,
    /// Unix seconds of the last persisted write
    pub last_update_time: i64,
}

impl ProgressionState {
    /// Onboarding shape: first sub-level, nothing accrued.
    pub fn new(user_id: impl Into<String>, tier_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tier_id: tier_id.into(),
            current_level: MIN_SUB_LEVEL,
            spirit_power: 0,
            spirit_stones: 0,
            breakthrough_bonus: 0,
            is_meditating: false,
            last_update_time: Utc::now().timestamp(),
        }
    }

    /// Checks the range invariants that types alone don't enforce.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !(MIN_SUB_LEVEL..=MAX_SUB_LEVEL).contains(&self.current_level) {
            return Err(format!(
                "current_level {} outside {}..={}",
                self.current_level, MIN_SUB_LEVEL, MAX_SUB_LEVEL
            ));
        }
        if self.breakthrough_bonus > MAX_BREAKTHROUGH_BONUS {
            return Err(format!(
                "breakthrough_bonus {} above {}",
                self.breakthrough_bonus, MAX_BREAKTHROUGH_BONUS
            ));
        }
        Ok(())
    }

    /// The fields a meditation flush overwrites, stamped with `now`.
    pub fn snapshot(&self) -> MeditationSnapshot {
        MeditationSnapshot {
            user_id: self.user_id.clone(),
            spirit_power: self.spirit_power,
            spirit_stones: self.spirit_stones,
            is_meditating: self.is_meditating,
            last_update_time: Utc::now().timestamp(),
        }
    }

    pub fn touch(&mut self) {
        self.last_update_time = Utc::now().timestamp();
    }
}

/// The four fields written by periodic and emergency flushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeditationSnapshot {
    pub user_id: String,
    pub spirit_power: u64,
    pub spirit_stones: u64,
    pub is_meditating: bool,
    pub last_update_time: i64,
}

impl MeditationSnapshot {
    /// Blind overwrite of the snapshot fields onto a stored state.
    pub fn apply_to(&self, state: &mut ProgressionState) {
        state.spirit_power = self.spirit_power;
        state.spirit_stones = self.spirit_stones;
        state.is_meditating = self.is_meditating;
        state.last_update_time = self.last_update_time;
    }
}

/// Everything persisted for one player; written as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub progression: ProgressionState,
    #[serde(default)]
    pub methods: Vec<OwnedMethod>,
}

impl PlayerRecord {
    pub fn new(progression: ProgressionState) -> Self {
        Self {
            progression,
            methods: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.progression.user_id
    }

    pub fn owned(&self, owned_id: &str) -> Option<&OwnedMethod> {
        self.methods.iter().find(|m| m.id == owned_id)
    }

    pub fn owns_method(&self, method_id: &str) -> bool {
        self.methods.iter().any(|m| m.method_id == method_id)
    }

    pub fn active(&self) -> Option<&OwnedMethod> {
        self.methods.iter().find(|m| m.is_active)
    }

    pub fn active_count(&self) -> usize {
        self.methods.iter().filter(|m| m.is_active).count()
    }
}
