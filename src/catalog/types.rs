use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Method rarity. Ordering follows shop order (Common first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn all() -> [Rarity; 5] {
        [
            Rarity::Common,
            Rarity::Uncommon,
            Rarity::Rare,
            Rarity::Epic,
            Rarity::Legendary,
        ]
    }

    /// Multiplier applied to `upgrade_cost_base` to get the purchase price.
    pub fn purchase_multiplier(&self) -> u64 {
        match self {
            Rarity::Common => 1,
            Rarity::Uncommon => 5,
            Rarity::Rare => 25,
            Rarity::Epic => 100,
            Rarity::Legendary => 500,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rarity::Common => "Mortal Grade",
            Rarity::Uncommon => "Low Grade",
            Rarity::Rare => "Middle Grade",
            Rarity::Epic => "High Grade",
            Rarity::Legendary => "Peak Grade",
        }
    }
}

/// A major stage of progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub name: String,
    pub order_index: u32,
    pub spirit_power_required: u64,
    pub is_major_tier: bool,
}

/// A learnable cultivation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_speed_multiplier: f64,
    pub upgrade_cost_base: u64,
    pub upgrade_cost_multiplier: f64,
    pub max_level: u32,
    pub rarity: Rarity,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog has no tiers")]
    NoTiers,
    #[error("duplicate tier id: {0}")]
    DuplicateTierId(String),
    #[error("duplicate tier order_index {0}")]
    DuplicateOrderIndex(u32),
    #[error("duplicate method id: {0}")]
    DuplicateMethodId(String),
    #[error("method {id} is invalid: {reason}")]
    InvalidMethod { id: String, reason: &'static str },
    #[error("could not read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
