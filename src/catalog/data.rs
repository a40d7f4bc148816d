//! Built-in realm ladder and method shop.

use super::types::{MethodDef, Rarity, Tier};

/// (id, name, spirit_power_required)
const REALMS: [(&str, &str, u64); 9] = [
    ("qi-condensation", "Qi Condensation", 0),
    ("foundation-establishment", "Foundation Establishment", 50_000),
    ("core-formation", "Core Formation", 150_000),
    ("nascent-soul", "Nascent Soul", 450_000),
    ("spirit-severing", "Spirit Severing", 1_200_000),
    ("void-refinement", "Void Refinement", 3_000_000),
    ("body-integration", "Body Integration", 7_500_000),
    ("mahayana", "Mahayana", 18_000_000),
    ("tribulation-transcendence", "Tribulation Transcendence", 45_000_000),
];

pub fn builtin_tiers() -> Vec<Tier> {
    REALMS
        .iter()
        .enumerate()
        .map(|(i, (id, name, required))| Tier {
            id: id.to_string(),
            name: name.to_string(),
            order_index: i as u32 + 1,
            spirit_power_required: *required,
            is_major_tier: true,
        })
        .collect()
}

pub fn builtin_methods() -> Vec<MethodDef> {
    vec![
        method(
            "breathing-art",
            "Basic Breathing Art",
            "Slow, steady breaths that draw in ambient qi.",
            1.2,
            10,
            1.5,
            10,
            Rarity::Common,
        ),
        method(
            "flowing-cloud",
            "Flowing Cloud Sutra",
            "Circulates qi like drifting clouds through the meridians.",
            1.5,
            20,
            1.6,
            10,
            Rarity::Uncommon,
        ),
        method(
            "azure-dragon",
            "Azure Dragon Scripture",
            "Borrows the vitality of the eastern dragon.",
            2.0,
            40,
            1.7,
            12,
            Rarity::Rare,
        ),
        method(
            "nine-suns",
            "Nine Suns Divine Art",
            "Refines qi in the heat of nine imagined suns.",
            3.0,
            80,
            1.8,
            15,
            Rarity::Epic,
        ),
        method(
            "primordial-chaos",
            "Primordial Chaos Canon",
            "Returns the body to the stillness before creation.",
            5.0,
            150,
            2.0,
            20,
            Rarity::Legendary,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn method(
    id: &str,
    name: &str,
    description: &str,
    base_speed_multiplier: f64,
    upgrade_cost_base: u64,
    upgrade_cost_multiplier: f64,
    max_level: u32,
    rarity: Rarity,
) -> MethodDef {
    MethodDef {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        base_speed_multiplier,
        upgrade_cost_base,
        upgrade_cost_multiplier,
        max_level,
        rarity,
    }
}
