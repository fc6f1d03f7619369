// save_record.rs - What a save file holds: per-faction level, unlocked
// skill nodes and the set of modifiers the player has switched on.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::{DEV_SAVE_NODE_LEVEL, MAX_LEVEL};
use crate::faction::{FactionId, FactionInfo};
use crate::skill_modifier::{ModifierCatalog, ModifierId, SkillModifierInfo};

/// One unlocked node of a faction's skill tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SkillNode {
    pub slug: String,
    pub level: u32,
}

/// A faction's progress inside one save.
///
/// Fields are private so the rules hold: the level only goes up (except
/// through `reset`), and every activated modifier has its skill node unlocked.
/// #[serde(default)] lets older files that lack a field still load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FactionProgress {
    #[serde(default)]
    level: u32,
    #[serde(default)]
    skill_nodes: Vec<SkillNode>,
    #[serde(default)]
    activated_modifiers: BTreeSet<ModifierId>,
}

impl FactionProgress {
    /// Max level with every node of `faction`'s tree unlocked. Used for the developer save.
    pub fn maxed(faction: &FactionInfo) -> Self {
        Self {
            level: MAX_LEVEL,
            skill_nodes: faction
                .skill_tree
                .iter()
                .map(|slug| SkillNode {
                    slug: slug.clone(),
                    level: DEV_SAVE_NODE_LEVEL,
                })
                .collect(),
            activated_modifiers: BTreeSet::new(),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Raises the level to `level`, capped at MAX_LEVEL. Lower values are ignored.
    /// Returns true if the level changed.
    pub fn raise_level(&mut self, level: u32) -> bool {
        let level = level.min(MAX_LEVEL);
        if level <= self.level {
            return false;
        }
        self.level = level;
        true
    }

    pub fn level_up(&mut self) -> bool {
        self.raise_level(self.level.saturating_add(1))
    }

    /// Brings a level above MAX_LEVEL back down to it. Only a hand-edited
    /// or damaged file can hold one. Returns true if the level changed.
    pub fn clamp_level(&mut self) -> bool {
        if self.level <= MAX_LEVEL {
            return false;
        }
        self.level = MAX_LEVEL;
        true
    }

    /// Back to level 0 with nothing unlocked or activated.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn skill_nodes(&self) -> &[SkillNode] {
        &self.skill_nodes
    }

    pub fn node_level(&self, slug: &str) -> Option<u32> {
        self.skill_nodes
            .iter()
            .find(|node| node.slug == slug)
            .map(|node| node.level)
    }

    pub fn is_node_unlocked(&self, slug: &str) -> bool {
        self.node_level(slug).is_some()
    }

    /// Unlocks `slug` at `level`, or raises an already unlocked node to it.
    /// Node levels never go down. Returns true if anything changed.
    pub fn unlock_node(&mut self, slug: &str, level: u32) -> bool {
        if level == 0 {
            return false;
        }
        match self.skill_nodes.iter_mut().find(|node| node.slug == slug) {
            Some(node) if node.level >= level => false,
            Some(node) => {
                node.level = level;
                true
            }
            None => {
                self.skill_nodes.push(SkillNode {
                    slug: slug.to_string(),
                    level,
                });
                true
            }
        }
    }

    pub fn activated_modifiers(&self) -> &BTreeSet<ModifierId> {
        &self.activated_modifiers
    }

    pub fn is_activated(&self, id: ModifierId) -> bool {
        self.activated_modifiers.contains(&id)
    }

    /// Marks `modifier` active. Refused when its governing skill node is locked
    /// or it is already active. Point accounting is the caller's job.
    pub fn activate(&mut self, modifier: &SkillModifierInfo) -> bool {
        if !self.is_node_unlocked(&modifier.governing_node) {
            return false;
        }
        self.activated_modifiers.insert(modifier.id)
    }

    pub fn deactivate(&mut self, id: ModifierId) -> bool {
        self.activated_modifiers.remove(&id)
    }

    /// Drops every activated modifier whose node is locked, or which the
    /// catalog does not know. Returns what was dropped.
    pub fn prune_locked(&mut self, catalog: &ModifierCatalog) -> Vec<ModifierId> {
        let locked: Vec<ModifierId> = self
            .activated_modifiers
            .iter()
            .copied()
            .filter(|id| match catalog.lookup(id) {
                Ok(info) => !self.is_node_unlocked(&info.governing_node),
                Err(_) => true,
            })
            .collect();
        for id in &locked {
            self.activated_modifiers.remove(id);
        }
        locked
    }
}

/// A versioned snapshot of the player's progress, one file per save.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    name: String,
    /// ISO-8601 UTC, refreshed every time the record is written.
    last_played: String,
    #[serde(default)]
    factions: BTreeMap<FactionId, FactionProgress>,
}

impl SaveRecord {
    /// A fresh record with zeroed progress for every faction.
    pub fn new(name: impl Into<String>) -> Self {
        let mut record = Self {
            name: name.into(),
            last_played: now_iso8601(),
            factions: BTreeMap::new(),
        };
        record.fill_missing_factions();
        record
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_played(&self) -> &str {
        &self.last_played
    }

    /// Stamps `last_played` with the current time.
    pub fn touch(&mut self) {
        self.last_played = now_iso8601();
    }

    pub fn set_last_played(&mut self, timestamp: impl Into<String>) {
        self.last_played = timestamp.into();
    }

    pub fn progress(&self, faction: FactionId) -> Option<&FactionProgress> {
        self.factions.get(&faction)
    }

    pub fn progress_mut(&mut self, faction: FactionId) -> &mut FactionProgress {
        self.factions.entry(faction).or_default()
    }

    pub fn factions(&self) -> impl Iterator<Item = (FactionId, &FactionProgress)> + '_ {
        self.factions.iter().map(|(id, progress)| (*id, progress))
    }

    /// Files written before a faction was added have no block for it.
    pub fn fill_missing_factions(&mut self) {
        for id in FactionId::ALL {
            self.factions.entry(id).or_default();
        }
    }

    /// Clamps every faction's level to MAX_LEVEL. Returns the factions that were over.
    pub fn clamp_levels(&mut self) -> Vec<FactionId> {
        self.factions
            .iter_mut()
            .filter_map(|(id, progress)| progress.clamp_level().then_some(*id))
            .collect()
    }

    /// `FactionProgress::prune_locked` for every faction in the record.
    pub fn prune_locked(&mut self, catalog: &ModifierCatalog) -> Vec<(FactionId, ModifierId)> {
        let mut dropped = Vec::new();
        for (faction, progress) in self.factions.iter_mut() {
            dropped.extend(
                progress
                    .prune_locked(catalog)
                    .into_iter()
                    .map(|id| (*faction, id)),
            );
        }
        dropped
    }
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn now_iso8601() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();
    format_iso8601(millis)
}

/// Formats milliseconds since the Unix epoch. Fixed width, so later
/// timestamps also sort later as plain strings.
pub fn format_iso8601(unix_millis: u64) -> String {
    let secs = unix_millis / 1000;
    let millis = unix_millis % 1000;
    let (year, month, day) = days_to_ymd(secs / 86400);
    let time_of_day = secs % 86400;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60,
        millis
    )
}

/// Days since the Unix epoch to (year, month, day), proleptic Gregorian.
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
