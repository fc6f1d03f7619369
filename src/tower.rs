use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Keyed};

pub struct TowerPlugin;

impl Plugin for TowerPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<UpgradeTowerRequest>()
            .add_message::<TowerUpgraded>()
            .add_systems(
                Update,
                upgrade_tower_system.run_if(resource_exists::<TowerCatalogRes>),
            );
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TowerType {
    Archer,
    Cannon,
    Hammer,
    Frost,
}

/// Stats for one level of one tower type.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerLevelStats {
    /// The level this block describes. Usually 1..N but not required to be contiguous.
    pub level: u32,
    /// Gold charged to reach this level.
    pub cost: u32,
    pub damage: u32,
    pub range: f32,
    /// Attacks per second.
    pub fire_rate: f32,
}

/// Every authored level of one tower type, in authoring order.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerLevelSeries {
    pub tower_type: TowerType,
    pub levels: Vec<TowerLevelStats>,
}

impl Keyed for TowerLevelSeries {
    type Key = TowerType;

    fn key(&self) -> TowerType {
        self.tower_type
    }
}

impl TowerLevelSeries {
    /// Stats for `level`, or None when no block declares it.
    ///
    /// A linear scan: the first block with a matching level wins, so an
    /// accidental duplicate in authoring data shadows the later one.
    pub fn data_for_level(&self, level: u32) -> Option<&TowerLevelStats> {
        self.levels.iter().find(|stats| stats.level == level)
    }

    /// Stats one level above `current_level`. None at the top of `u32` too.
    fn next_level(&self, current_level: u32) -> Option<&TowerLevelStats> {
        self.data_for_level(current_level.checked_add(1)?)
    }

    pub fn can_upgrade(&self, current_level: u32) -> bool {
        self.next_level(current_level).is_some()
    }

    /// What the next upgrade from `current_level` would cost, if one exists.
    pub fn upgrade_cost(&self, current_level: u32) -> Option<u32> {
        self.next_level(current_level).map(|stats| stats.cost)
    }

    pub fn max_level(&self) -> u32 {
        self.levels.iter().map(|stats| stats.level).max().unwrap_or(0)
    }
}

pub type TowerCatalog = Catalog<TowerType, TowerLevelSeries>;

#[derive(Resource, Debug, Clone)]
pub struct TowerAuthoring(pub Vec<TowerLevelSeries>);

impl Default for TowerAuthoring {
    fn default() -> Self {
        Self(default_towers())
    }
}

#[derive(Resource, Debug, Clone)]
pub struct TowerCatalogRes(pub TowerCatalog);

// =============================================================================
// UPGRADES
// =============================================================================

/// The parts of a tower entity the upgrade rules read and write.
///
/// The Tower component implements this; tests and tools can provide
/// their own stand-in without spawning an entity.
pub trait UpgradeTarget {
    fn tower_type(&self) -> TowerType;
    fn level(&self) -> u32;
    /// Highest level this particular tower may reach (map or research caps).
    fn max_allowed_level(&self) -> u32;
    /// Switch the tower over to `stats`, including its level.
    fn apply_level(&mut self, stats: &TowerLevelStats);
}

/// Raised when an upgrade goes through. The cost is paid by whoever listens.
#[derive(Clone, Debug, PartialEq)]
pub struct UpgradeCostIncurred {
    pub tower_type: TowerType,
    pub new_level: u32,
    pub cost: u32,
}

/// Tries to move `tower` up one level.
///
/// Returns None and leaves the tower untouched when there is no authored
/// next level or the next level is above the tower's cap. A None is not a
/// failure to recover from; the upgrade simply does not happen.
pub fn request_upgrade(
    catalog: &TowerCatalog,
    tower: &mut impl UpgradeTarget,
) -> Option<UpgradeCostIncurred> {
    let series = match catalog.lookup(&tower.tower_type()) {
        Ok(series) => series,
        Err(e) => {
            warn!("Cannot upgrade tower: {}", e);
            return None;
        }
    };

    let stats = series.next_level(tower.level())?;
    if stats.level > tower.max_allowed_level() {
        return None;
    }
    tower.apply_level(stats);

    Some(UpgradeCostIncurred {
        tower_type: series.tower_type,
        new_level: stats.level,
        cost: stats.cost,
    })
}

/// A placed tower.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Tower {
    pub tower_type: TowerType,
    pub level: u32,
    pub max_allowed_level: u32,
    pub damage: u32,
    pub range: f32,
    pub fire_rate: f32,
}

impl Tower {
    /// A level-1 tower, or None if the catalog has no level 1 for `tower_type`.
    pub fn new(catalog: &TowerCatalog, tower_type: TowerType, max_allowed_level: u32) -> Option<Self> {
        let stats = catalog.lookup(&tower_type).ok()?.data_for_level(1)?;
        let mut tower = Tower {
            tower_type,
            level: 0,
            max_allowed_level,
            damage: 0,
            range: 0.0,
            fire_rate: 0.0,
        };
        tower.apply_level(stats);
        Some(tower)
    }
}

impl UpgradeTarget for Tower {
    fn tower_type(&self) -> TowerType {
        self.tower_type
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn max_allowed_level(&self) -> u32 {
        self.max_allowed_level
    }

    fn apply_level(&mut self, stats: &TowerLevelStats) {
        self.level = stats.level;
        self.damage = stats.damage;
        self.range = stats.range;
        self.fire_rate = stats.fire_rate;
    }
}

/// Sent by the UI when the player clicks "upgrade" on a tower.
#[derive(Message, Clone, Debug)]
pub struct UpgradeTowerRequest {
    pub entity: Entity,
}

/// Sent after a tower has been upgraded, so the economy can charge the cost.
#[derive(Message, Clone, Debug, PartialEq)]
pub struct TowerUpgraded {
    pub entity: Entity,
    pub upgrade: UpgradeCostIncurred,
}

fn upgrade_tower_system(
    mut requests: MessageReader<UpgradeTowerRequest>,
    mut upgraded: MessageWriter<TowerUpgraded>,
    mut towers: Query<&mut Tower>,
    catalog: Res<TowerCatalogRes>,
) {
    for request in requests.read() {
        let Ok(mut tower) = towers.get_mut(request.entity) else {
            warn!("Upgrade requested for {:?}, which is not a tower", request.entity);
            continue;
        };

        if let Some(upgrade) = request_upgrade(&catalog.0, &mut *tower) {
            info!(
                "Upgraded {:?} to level {} for {} gold",
                upgrade.tower_type, upgrade.new_level, upgrade.cost
            );
            upgraded.write(TowerUpgraded {
                entity: request.entity,
                upgrade,
            });
        }
    }
}

fn stats(level: u32, cost: u32, damage: u32, range: f32, fire_rate: f32) -> TowerLevelStats {
    TowerLevelStats {
        level,
        cost,
        damage,
        range,
        fire_rate,
    }
}

pub fn default_towers() -> Vec<TowerLevelSeries> {
    vec![
        TowerLevelSeries {
            tower_type: TowerType::Archer,
            levels: vec![
                stats(1, 50, 8, 6.0, 1.5),
                stats(2, 40, 11, 6.5, 1.7),
                stats(3, 70, 15, 7.0, 1.9),
                stats(4, 120, 20, 7.5, 2.2),
            ],
        },
        TowerLevelSeries {
            tower_type: TowerType::Cannon,
            levels: vec![
                stats(1, 90, 25, 5.0, 0.5),
                stats(2, 80, 35, 5.0, 0.55),
                stats(3, 140, 50, 5.5, 0.6),
            ],
        },
        TowerLevelSeries {
            tower_type: TowerType::Hammer,
            levels: vec![
                stats(1, 120, 40, 1.5, 0.4),
                stats(2, 100, 60, 1.5, 0.45),
                stats(3, 180, 90, 2.0, 0.5),
            ],
        },
        TowerLevelSeries {
            tower_type: TowerType::Frost,
            levels: vec![stats(1, 70, 4, 5.0, 1.0), stats(2, 90, 6, 5.5, 1.2)],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TowerCatalog {
        TowerCatalog::from_entries(default_towers())
    }

    fn tower(tower_type: TowerType, level: u32, max_allowed_level: u32) -> Tower {
        Tower {
            tower_type,
            level,
            max_allowed_level,
            damage: 0,
            range: 0.0,
            fire_rate: 0.0,
        }
    }

    #[test]
    fn data_for_level_returns_first_match() {
        let series = TowerLevelSeries {
            tower_type: TowerType::Archer,
            levels: vec![stats(1, 10, 1, 1.0, 1.0), stats(1, 99, 2, 2.0, 2.0)],
        };
        assert_eq!(series.data_for_level(1).unwrap().cost, 10);
        assert!(series.data_for_level(2).is_none());
    }

    #[test]
    fn can_upgrade_requires_next_level_block() {
        let catalog = catalog();
        let cannon = catalog.lookup(&TowerType::Cannon).unwrap();
        assert!(cannon.can_upgrade(2));
        assert!(!cannon.can_upgrade(3));
        assert_eq!(cannon.upgrade_cost(1), Some(80));
        assert_eq!(cannon.max_level(), 3);
    }

    #[test]
    fn gaps_in_levels_block_upgrades() {
        let series = TowerLevelSeries {
            tower_type: TowerType::Frost,
            levels: vec![stats(1, 10, 1, 1.0, 1.0), stats(3, 30, 3, 3.0, 3.0)],
        };
        assert!(!series.can_upgrade(1));
        assert!(series.can_upgrade(2));
    }

    #[test]
    fn upgrade_applies_next_level_and_reports_cost() {
        let catalog = catalog();
        let mut archer = Tower::new(&catalog, TowerType::Archer, 4).unwrap();

        let upgrade = request_upgrade(&catalog, &mut archer).unwrap();

        assert_eq!(
            upgrade,
            UpgradeCostIncurred {
                tower_type: TowerType::Archer,
                new_level: 2,
                cost: 40,
            }
        );
        assert_eq!(archer.level, 2);
        assert_eq!(archer.damage, 11);
    }

    #[test]
    fn upgrade_past_cap_is_a_no_op() {
        let catalog = catalog();
        let mut archer = tower(TowerType::Archer, 2, 2);
        let before = archer.clone();

        assert!(request_upgrade(&catalog, &mut archer).is_none());
        assert_eq!(archer, before);
    }

    #[test]
    fn upgrade_past_last_authored_level_is_a_no_op() {
        let catalog = catalog();
        let mut frost = tower(TowerType::Frost, 2, 10);

        assert!(request_upgrade(&catalog, &mut frost).is_none());
        assert_eq!(frost.level, 2);
    }

    #[test]
    fn top_of_range_level_cannot_upgrade() {
        let catalog = catalog();
        let archer = catalog.lookup(&TowerType::Archer).unwrap();
        assert!(!archer.can_upgrade(u32::MAX));
        assert_eq!(archer.upgrade_cost(u32::MAX), None);

        let mut odd = tower(TowerType::Archer, u32::MAX, u32::MAX);
        assert!(request_upgrade(&catalog, &mut odd).is_none());
        assert_eq!(odd.level, u32::MAX);
    }

    #[test]
    fn unknown_tower_type_is_a_no_op() {
        let catalog = TowerCatalog::from_entries(vec![]);
        let mut hammer = tower(TowerType::Hammer, 1, 3);
        assert!(request_upgrade(&catalog, &mut hammer).is_none());
        assert_eq!(hammer.level, 1);
    }
}
