//! Read-only realm and method catalog shared by every session.

pub mod data;
pub mod types;

pub use types::*;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Tiers ordered by `order_index` plus the method shop.
#[derive(Debug, Clone)]
pub struct Catalog {
    tiers: Vec<Tier>,
    methods: Vec<MethodDef>,
}

impl Catalog {
    pub fn new(mut tiers: Vec<Tier>, mut methods: Vec<MethodDef>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::NoTiers);
        }

        let mut ids = HashSet::new();
        let mut orders = HashSet::new();
        for tier in &tiers {
            if !ids.insert(tier.id.as_str()) {
                return Err(CatalogError::DuplicateTierId(tier.id.clone()));
            }
            if !orders.insert(tier.order_index) {
                return Err(CatalogError::DuplicateOrderIndex(tier.order_index));
            }
        }

        let mut method_ids = HashSet::new();
        for method in &methods {
            if !method_ids.insert(method.id.as_str()) {
                return Err(CatalogError::DuplicateMethodId(method.id.clone()));
            }
            validate_method(method)?;
        }

        tiers.sort_by_key(|t| t.order_index);
        methods.sort_by(|a, b| a.rarity.cmp(&b.rarity).then_with(|| a.name.cmp(&b.name)));

        Ok(Self { tiers, methods })
    }

    pub fn builtin() -> Self {
        // Static data is validated by the unit tests below
        Self::new(data::builtin_tiers(), data::builtin_methods())
            .unwrap_or_else(|e| panic!("built-in catalog is invalid: {e}"))
    }

    /// Parses `{"tiers": [...], "methods": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        #[derive(serde::Deserialize)]
        struct CatalogFile {
            tiers: Vec<Tier>,
            #[serde(default)]
            methods: Vec<MethodDef>,
        }

        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.tiers, file.methods)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn first_tier(&self) -> &Tier {
        &self.tiers[0]
    }

    pub fn tier(&self, id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    /// The tier whose order_index is exactly one above `id`'s.
    pub fn next_tier(&self, id: &str) -> Option<&Tier> {
        let next_index = self.tier(id)?.order_index.checked_add(1)?;
        self.tiers.iter().find(|t| t.order_index == next_index)
    }

    pub fn method(&self, id: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.id == id)
    }
}

fn validate_method(method: &MethodDef) -> Result<(), CatalogError> {
    let reason = if !(method.base_speed_multiplier > 0.0) {
        Some("base_speed_multiplier must be positive")
    } else if method.upgrade_cost_base == 0 {
        Some("upgrade_cost_base must be positive")
    } else if !(method.upgrade_cost_multiplier >= 1.0) {
        Some("upgrade_cost_multiplier must be at least 1")
    } else if method.max_level == 0 {
        Some("max_level must be at least 1")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CatalogError::InvalidMethod {
            id: method.id.clone(),
            reason,
        }),
        None => Ok(()),
    }
}
