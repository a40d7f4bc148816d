//! The per-second meditation tick.
//!
//! `meditation_tick()` advances spirit power by the canonical accrual rate and
//! rolls for a spirit stone windfall. It returns a [`TickResult`] so the
//! session can log and publish what happened without the tick knowing about
//! persistence or presentation.

use super::constants::{STONE_FIND_CHANCE, STONE_FIND_MAX, STONE_FIND_MIN};
use super::state::ProgressionState;
use crate::methods::{accrual_rate, ActiveMethod};
use rand::Rng;

/// A single event produced by a meditation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    /// Spirit power gathered this tick.
    SpiritGathered { amount: u64 },

    /// Spirit stones found while meditating.
    StonesFound { amount: u64, message: String },
}

/// Result of processing a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    pub power_gained: u64,
    pub stones_gained: u64,
    /// Events in the order they happened.
    pub events: Vec<TickEvent>,
}

impl TickResult {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Processes one meditation tick.
///
/// Does nothing unless `state.is_meditating`. Pass a seeded
/// `rand_chacha::ChaCha8Rng` in tests for deterministic stone rolls.
pub fn meditation_tick<R: Rng + ?Sized>(
    state: &mut ProgressionState,
    active: Option<ActiveMethod<'_>>,
    rng: &mut R,
) -> TickResult {
    let mut result = TickResult::default();
    if !state.is_meditating {
        return result;
    }

    // ── 1. Spirit power ─────────────────────────────────────────
    let speed = accrual_rate(active);
    state.spirit_power = state.spirit_power.saturating_add(speed);
    result.power_gained = speed;
    result
        .events
        .push(TickEvent::SpiritGathered { amount: speed });

    // ── 2. Stone windfall (independent roll) ────────────────────
    if rng.gen::<f64>() < STONE_FIND_CHANCE {
        let amount = rng.gen_range(STONE_FIND_MIN..=STONE_FIND_MAX);
        state.spirit_stones = state.spirit_stones.saturating_add(amount);
        result.stones_gained = amount;
        result.events.push(TickEvent::StonesFound {
            amount,
            message: format!("+{} spirit stones", amount),
        });
    }

    result
}
