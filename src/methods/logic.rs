use super::types::{ActiveMethod, MethodChange, OwnedMethod};
use crate::catalog::{Catalog, MethodDef};
use crate::core::constants::{BASE_SPIRIT_PER_TICK, METHOD_LEVEL_BONUS_STEP};
use crate::core::error::{EngineError, InvalidTransition, Resource};
use crate::core::state::PlayerRecord;

/// Spirit stones needed to learn a method. Saturates, so an absurd base
/// is simply unaffordable.
pub fn purchase_cost(def: &MethodDef) -> u64 {
    def.upgrade_cost_base.saturating_mul(def.rarity.purchase_multiplier())
}

/// Spirit stones needed to raise a method from `level` to `level + 1`.
pub fn upgrade_cost(def: &MethodDef, level: u32) -> u64 {
    let exponent = level.saturating_sub(1) as i32;
    (def.upgrade_cost_base as f64 * def.upgrade_cost_multiplier.powi(exponent)).floor() as u64
}

/// Multiplier a method contributes at a given level.
pub fn level_bonus(level: u32) -> f64 {
    1.0 + level.saturating_sub(1) as f64 * METHOD_LEVEL_BONUS_STEP
}

/// Spirit power gained per meditation tick.
///
/// This is the only accrual formula: the tick loop and every status report
/// go through it.
pub fn accrual_rate(active: Option<ActiveMethod<'_>>) -> u64 {
    let (multiplier, bonus) = match active {
        Some(active) => (
            active.def.base_speed_multiplier,
            level_bonus(active.owned.current_level),
        ),
        None => (1.0, 1.0),
    };
    (BASE_SPIRIT_PER_TICK * multiplier * bonus).floor() as u64
}

/// The active method among `methods`, if its definition is still in the catalog.
pub fn active_method<'a>(
    methods: &'a [OwnedMethod],
    catalog: &'a Catalog,
) -> Option<ActiveMethod<'a>> {
    let owned = methods.iter().find(|m| m.is_active)?;
    let def = catalog.method(&owned.method_id)?;
    Some(ActiveMethod { owned, def })
}

/// Learn a method. Debit and the new method land in `record` together.
pub fn try_purchase(record: &mut PlayerRecord, def: &MethodDef) -> Result<MethodChange, EngineError> {
    if record.owns_method(&def.id) {
        return Err(InvalidTransition::AlreadyOwned.into());
    }

    let cost = purchase_cost(def);
    let stones = record.progression.spirit_stones;
    if stones < cost {
        return Err(EngineError::InsufficientResource {
            resource: Resource::SpiritStones,
            required: cost,
            available: stones,
        });
    }

    let method = OwnedMethod::learned(record.user_id(), &def.id);
    record.progression.spirit_stones -= cost;
    record.methods.push(method.clone());

    Ok(MethodChange {
        method,
        stones_spent: cost,
    })
}

/// Raise an owned method by one level.
pub fn try_upgrade(
    record: &mut PlayerRecord,
    catalog: &Catalog,
    owned_id: &str,
) -> Result<MethodChange, EngineError> {
    let owned = record
        .owned(owned_id)
        .ok_or_else(|| EngineError::UnknownMethod(owned_id.to_string()))?;
    let def = catalog
        .method(&owned.method_id)
        .ok_or_else(|| EngineError::UnknownMethod(owned.method_id.clone()))?;

    if owned.current_level >= def.max_level {
        return Err(InvalidTransition::MaxLevel.into());
    }

    let cost = upgrade_cost(def, owned.current_level);
    let stones = record.progression.spirit_stones;
    if stones < cost {
        return Err(EngineError::InsufficientResource {
            resource: Resource::SpiritStones,
            required: cost,
            available: stones,
        });
    }

    record.progression.spirit_stones -= cost;
    let owned = record
        .methods
        .iter_mut()
        .find(|m| m.id == owned_id)
        .ok_or_else(|| EngineError::UnknownMethod(owned_id.to_string()))?;
    owned.current_level += 1;

    Ok(MethodChange {
        method: owned.clone(),
        stones_spent: cost,
    })
}

/// Make `owned_id` the only active method in one pass over the record.
pub fn activate(record: &mut PlayerRecord, owned_id: &str) -> Result<MethodChange, EngineError> {
    if record.owned(owned_id).is_none() {
        return Err(EngineError::UnknownMethod(owned_id.to_string()));
    }

    for method in record.methods.iter_mut() {
        method.is_active = method.id == owned_id;
    }

    let method = record
        .owned(owned_id)
        .cloned()
        .ok_or_else(|| EngineError::UnknownMethod(owned_id.to_string()))?;

    Ok(MethodChange {
        method,
        stones_spent: 0,
    })
}
