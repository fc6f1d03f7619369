// skill_modifier.rs - Skill modifiers: passive bonuses unlocked through a
// faction's skill tree and switched on by spending modifier points.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Keyed};
use crate::faction::FactionId;
use crate::tower::TowerType;

/// The fixed set of modifiers. Saves store these in each faction's
/// activated set, so renaming a variant breaks old save files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModifierId {
    TemperedSteel,
    RuneInscription,
    ThunderStrike,
    StoneMasonry,
    WarTaxes,
    VolleyFire,
    MoonlitReach,
    Thornbind,
}

/// What a modifier does, with the numbers for that kind of effect.
///
/// Each variant carries its own parameter block. Systems that apply
/// modifiers match on this instead of asking the modifier what it can do.
#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    /// Percent bonus to damage for one tower type, or all towers when `None`.
    DamageBoost { tower: Option<TowerType>, percent: u32 },
    RangeBoost { tower: Option<TowerType>, percent: u32 },
    FireRateBoost { tower: Option<TowerType>, percent: u32 },
    /// Percent discount on tower build and upgrade costs.
    CostReduction { percent: u32 },
    /// Hammer strikes stun enemies in a radius.
    HammerStun { radius: f32, seconds: f32 },
    /// Gold awarded at the end of each wave.
    WaveIncome { gold: u32 },
    /// Enemies hit are slowed.
    Slow { percent: u32, seconds: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillModifierInfo {
    pub id: ModifierId,
    pub faction: FactionId,
    pub display_name: String,
    /// Slug of the skill node that must be unlocked before this can be activated.
    pub governing_node: String,
    /// Free modifiers can be toggled without spending points.
    pub costs_point: bool,
    pub kind: ModifierKind,
}

impl Keyed for SkillModifierInfo {
    type Key = ModifierId;

    fn key(&self) -> ModifierId {
        self.id
    }
}

pub type ModifierCatalog = Catalog<ModifierId, SkillModifierInfo>;

#[derive(Resource, Debug, Clone)]
pub struct ModifierAuthoring(pub Vec<SkillModifierInfo>);

impl Default for ModifierAuthoring {
    fn default() -> Self {
        Self(default_modifiers())
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ModifierCatalogRes(pub ModifierCatalog);

/// Modifiers belonging to `faction`, in authoring order.
pub fn modifiers_for(
    catalog: &ModifierCatalog,
    faction: FactionId,
) -> impl Iterator<Item = &SkillModifierInfo> + '_ {
    catalog.iter().filter(move |info| info.faction == faction)
}

fn modifier(
    id: ModifierId,
    faction: FactionId,
    name: &str,
    node: &str,
    costs_point: bool,
    kind: ModifierKind,
) -> SkillModifierInfo {
    SkillModifierInfo {
        id,
        faction,
        display_name: name.to_string(),
        governing_node: node.to_string(),
        costs_point,
        kind,
    }
}

pub fn default_modifiers() -> Vec<SkillModifierInfo> {
    use FactionId::*;
    use ModifierId::*;

    vec![
        modifier(
            TemperedSteel,
            Dwarves,
            "Tempered Steel",
            "forge",
            true,
            ModifierKind::DamageBoost {
                tower: None,
                percent: 10,
            },
        ),
        modifier(
            RuneInscription,
            Dwarves,
            "Rune Inscription",
            "runesmith",
            true,
            ModifierKind::RangeBoost {
                tower: Some(TowerType::Cannon),
                percent: 15,
            },
        ),
        modifier(
            ThunderStrike,
            Dwarves,
            "Thunder Strike",
            "thunder-hammer",
            true,
            ModifierKind::HammerStun {
                radius: 2.5,
                seconds: 1.5,
            },
        ),
        modifier(
            StoneMasonry,
            Humans,
            "Stone Masonry",
            "masonry",
            true,
            ModifierKind::CostReduction { percent: 10 },
        ),
        // Granted with the tax collector node, no point required.
        modifier(
            WarTaxes,
            Humans,
            "War Taxes",
            "tax-collector",
            false,
            ModifierKind::WaveIncome { gold: 25 },
        ),
        modifier(
            VolleyFire,
            Humans,
            "Volley Fire",
            "crossbows",
            true,
            ModifierKind::FireRateBoost {
                tower: Some(TowerType::Archer),
                percent: 20,
            },
        ),
        modifier(
            MoonlitReach,
            Elves,
            "Moonlit Reach",
            "moonwell",
            true,
            ModifierKind::RangeBoost {
                tower: None,
                percent: 10,
            },
        ),
        modifier(
            Thornbind,
            Elves,
            "Thornbind",
            "thornwall",
            true,
            ModifierKind::Slow {
                percent: 30,
                seconds: 2.0,
            },
        ),
    ]
}
