use crate::catalog::MethodDef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A method a player has learned. Never removed once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedMethod {
    pub id: String,
    pub user_id: String,
    pub method_id: String,
    pub current_level: u32,
    pub is_active: bool,
}

impl OwnedMethod {
    /// Freshly learned: level 1, inactive.
    pub fn learned(user_id: &str, method_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            method_id: method_id.to_string(),
            current_level: 1,
            is_active: false,
        }
    }
}

/// The active method paired with its catalog definition.
#[derive(Debug, Clone, Copy)]
pub struct ActiveMethod<'a> {
    pub owned: &'a OwnedMethod,
    pub def: &'a MethodDef,
}

/// Outcome of a purchase, upgrade or activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodChange {
    pub method: OwnedMethod,
    pub stones_spent: u64,
}
