use super::types::*;
use crate::catalog::Catalog;
use crate::core::constants::*;
use crate::core::error::{EngineError, InvalidTransition, Resource};
use crate::core::state::ProgressionState;
use rand::Rng;

/// Phase for a player who is not mid-ritual.
pub fn phase_for(state: &ProgressionState, catalog: &Catalog) -> BreakthroughPhase {
    if state.current_level >= MAX_SUB_LEVEL && catalog.next_tier(&state.tier_id).is_none() {
        BreakthroughPhase::MaxTier
    } else {
        BreakthroughPhase::Idle
    }
}

/// Success odds after the bonus, never above 100.
pub fn total_success_rate(base_rate: u32, bonus: u32) -> u32 {
    (base_rate + bonus).min(MAX_SUCCESS_RATE)
}

/// Spirit power needed to step from `level` to `level + 1` inside a tier.
pub fn minor_required_power(tier_requirement: u64, level: u32) -> u64 {
    let base = if tier_requirement == 0 {
        FALLBACK_MINOR_COST_BASE
    } else {
        tier_requirement
    };
    (base as f64 * (1.0 + level as f64 * MINOR_COST_LEVEL_STEP)).floor() as u64
}

/// Work out the next breakthrough from the current state.
///
/// Fails with `MaxTier` at level 9 of the last tier, and with `UnknownTier`
/// if the state points at a tier the catalog doesn't have.
pub fn plan_breakthrough(
    state: &ProgressionState,
    catalog: &Catalog,
) -> Result<BreakthroughPlan, EngineError> {
    let current = catalog
        .tier(&state.tier_id)
        .ok_or_else(|| EngineError::UnknownTier(state.tier_id.clone()))?;
    let next = catalog.next_tier(&state.tier_id);

    let at_peak = state.current_level >= MAX_SUB_LEVEL;
    let (kind, required_power, base_rate, target_tier_id, target_level) = match next {
        Some(next) if at_peak => (
            BreakthroughKind::Major,
            next.spirit_power_required,
            MAJOR_BREAKTHROUGH_BASE_RATE,
            next.id.clone(),
            MIN_SUB_LEVEL,
        ),
        None if at_peak => return Err(InvalidTransition::MaxTier.into()),
        _ => (
            BreakthroughKind::Minor,
            minor_required_power(current.spirit_power_required, state.current_level),
            MINOR_BREAKTHROUGH_BASE_RATE,
            current.id.clone(),
            state.current_level + 1,
        ),
    };

    let progress_percent = if required_power == 0 {
        100.0
    } else {
        (state.spirit_power as f64 / required_power as f64 * 100.0).min(100.0)
    };

    Ok(BreakthroughPlan {
        kind,
        required_power,
        has_enough_power: state.spirit_power >= required_power,
        success_rate: total_success_rate(base_rate, state.breakthrough_bonus),
        target_tier_id,
        target_level,
        progress_percent,
    })
}

/// Apply a drawn `roll` (in [0, 100)) to the state.
///
/// Caller must have checked `plan.has_enough_power`.
pub fn resolve_breakthrough(
    state: &mut ProgressionState,
    plan: &BreakthroughPlan,
    roll: f64,
) -> BreakthroughOutcome {
    let success = roll < plan.success_rate as f64;

    match (success, plan.kind) {
        (true, BreakthroughKind::Major) => {
            state.tier_id = plan.target_tier_id.clone();
            state.current_level = MIN_SUB_LEVEL;
            state.spirit_power = 0;
            state.breakthrough_bonus = 0;
            BreakthroughOutcome::MajorSuccess {
                new_tier_id: plan.target_tier_id.clone(),
            }
        }
        (true, BreakthroughKind::Minor) => {
            state.current_level = (state.current_level + 1).min(MAX_SUB_LEVEL);
            state.spirit_power = state.spirit_power.saturating_sub(plan.required_power);
            BreakthroughOutcome::MinorSuccess {
                new_level: state.current_level,
                power_spent: plan.required_power,
            }
        }
        (false, _) => {
            let before = state.spirit_power;
            state.current_level = state.current_level.saturating_sub(1).max(MIN_SUB_LEVEL);
            state.spirit_power = before / 2;
            state.breakthrough_bonus =
                (state.breakthrough_bonus + FAILURE_BONUS_GAIN).min(MAX_BREAKTHROUGH_BONUS);
            BreakthroughOutcome::Failure {
                new_level: state.current_level,
                power_lost: before - state.spirit_power,
                new_bonus: state.breakthrough_bonus,
            }
        }
    }
}

/// Check eligibility, draw the roll and resolve in one step.
pub fn attempt_breakthrough<R: Rng + ?Sized>(
    state: &mut ProgressionState,
    catalog: &Catalog,
    rng: &mut R,
) -> Result<BreakthroughResolution, EngineError> {
    let plan = check_eligible(state, catalog)?;
    let roll = draw_roll(rng);
    let outcome = resolve_breakthrough(state, &plan, roll);
    Ok(BreakthroughResolution {
        plan,
        roll,
        outcome,
    })
}

/// Plan and reject an underpowered attempt without touching state.
pub fn check_eligible(
    state: &ProgressionState,
    catalog: &Catalog,
) -> Result<BreakthroughPlan, EngineError> {
    let plan = plan_breakthrough(state, catalog)?;
    if !plan.has_enough_power {
        return Err(EngineError::InsufficientResource {
            resource: Resource::SpiritPower,
            required: plan.required_power,
            available: state.spirit_power,
        });
    }
    Ok(plan)
}

/// Uniform roll in [0, 100).
pub fn draw_roll<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Tier;

    fn catalog() -> Catalog {
        let tier = |id: &str, order_index: u32, required: u64| Tier {
            id: id.to_string(),
            name: id.to_string(),
            order_index,
            spirit_power_required: required,
            is_major_tier: true,
        };
        Catalog::new(vec![tier("t1", 1, 0), tier("t2", 2, 1000)], vec![]).unwrap()
    }

    #[test]
    fn test_total_success_rate_caps_at_100() {
        assert_eq!(total_success_rate(30, 0), 30);
        assert_eq!(total_success_rate(30, 70), 100);
        assert_eq!(total_success_rate(30, 100), 100);
        assert_eq!(total_success_rate(100, 5), 100);
    }

    #[test]
    fn test_minor_required_power_uses_fallback_for_zero_requirement() {
        assert_eq!(minor_required_power(0, 1), 1500);
        assert_eq!(minor_required_power(1000, 8), 5000);
        assert_eq!(minor_required_power(333, 1), 499);
    }

    #[test]
    fn test_phase_for_max_tier() {
        let catalog = catalog();
        let mut state = ProgressionState::new("u", "t2");
        assert_eq!(phase_for(&state, &catalog), BreakthroughPhase::Idle);
        state.current_level = 9;
        assert_eq!(phase_for(&state, &catalog), BreakthroughPhase::MaxTier);
        state.tier_id = "t1".to_string();
        assert_eq!(phase_for(&state, &catalog), BreakthroughPhase::Idle);
    }

    #[test]
    fn test_plan_at_max_tier_is_invalid() {
        let catalog = catalog();
        let mut state = ProgressionState::new("u", "t2");
        state.current_level = 9;
        state.spirit_power = u64::MAX;
        assert!(matches!(
            plan_breakthrough(&state, &catalog),
            Err(EngineError::InvalidTransition(InvalidTransition::MaxTier))
        ));
    }

    #[test]
    fn test_plan_unknown_tier() {
        let state = ProgressionState::new("u", "ghost");
        assert!(matches!(
            plan_breakthrough(&state, &catalog()),
            Err(EngineError::UnknownTier(_))
        ));
    }

    #[test]
    fn test_progress_percent_caps() {
        let catalog = catalog();
        let mut state = ProgressionState::new("u", "t2");
        state.spirit_power = 750; // level 1 of t2 needs 1500
        let plan = plan_breakthrough(&state, &catalog).unwrap();
        assert!((plan.progress_percent - 50.0).abs() < 1e-9);
        state.spirit_power = 10_000;
        let plan = plan_breakthrough(&state, &catalog).unwrap();
        assert_eq!(plan.progress_percent, 100.0);
    }
}
