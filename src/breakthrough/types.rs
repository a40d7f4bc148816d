use serde::{Deserialize, Serialize};

/// Where a player's breakthrough state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakthroughPhase {
    Idle,
    /// Ritual in progress; the outcome has not been drawn yet
    Attempting,
    Success,
    Failure,
    /// Level 9 of the last tier; nothing further to attempt
    MaxTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakthroughKind {
    /// Next sub-level within the current tier
    Minor,
    /// Level 9 into the next tier
    Major,
}

/// Everything needed to show and resolve the next breakthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakthroughPlan {
    pub kind: BreakthroughKind,
    pub required_power: u64,
    pub has_enough_power: bool,
    /// Success odds in percentage points, capped at 100
    pub success_rate: u32,
    pub target_tier_id: String,
    pub target_level: u32,
    /// Progress toward `required_power`, 0.0-100.0
    pub progress_percent: f64,
}

impl BreakthroughPlan {
    pub fn is_major(&self) -> bool {
        self.kind == BreakthroughKind::Major
    }
}

/// What a resolved attempt did to the player's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakthroughOutcome {
    MinorSuccess {
        new_level: u32,
        power_spent: u64,
    },
    MajorSuccess {
        new_tier_id: String,
    },
    Failure {
        new_level: u32,
        power_lost: u64,
        new_bonus: u32,
    },
}

impl BreakthroughOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, BreakthroughOutcome::Failure { .. })
    }

    /// Phase the state machine lands in right after resolution.
    pub fn phase(&self) -> BreakthroughPhase {
        if self.is_success() {
            BreakthroughPhase::Success
        } else {
            BreakthroughPhase::Failure
        }
    }
}

/// An accepted attempt: the plan it ran under, the roll, and the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakthroughResolution {
    pub plan: BreakthroughPlan,
    pub roll: f64,
    pub outcome: BreakthroughOutcome,
}
