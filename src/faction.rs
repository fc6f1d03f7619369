use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Keyed};

/// The playable factions. Every save carries one progress block per faction.
///
/// Ord is derived so factions can key a BTreeMap, which keeps save files
/// written in a stable order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactionId {
    Dwarves,
    Humans,
    Elves,
}

impl FactionId {
    pub const ALL: [FactionId; 3] = [FactionId::Dwarves, FactionId::Humans, FactionId::Elves];
}

/// Display metadata for a faction. Read-only authoring data.
#[derive(Debug, Clone, PartialEq)]
pub struct FactionInfo {
    pub id: FactionId,
    pub display_name: String,
    pub description: String,
    /// Slugs of the skill nodes in this faction's tree, root first.
    pub skill_tree: Vec<String>,
}

impl Keyed for FactionInfo {
    type Key = FactionId;

    fn key(&self) -> FactionId {
        self.id
    }
}

pub type FactionCatalog = Catalog<FactionId, FactionInfo>;

/// Authoring list the faction catalog is built from.
/// Editing this resource at runtime rebuilds `FactionCatalogRes`.
#[derive(Resource, Debug, Clone)]
pub struct FactionAuthoring(pub Vec<FactionInfo>);

impl Default for FactionAuthoring {
    fn default() -> Self {
        Self(default_factions())
    }
}

#[derive(Resource, Debug, Clone)]
pub struct FactionCatalogRes(pub FactionCatalog);

fn faction(id: FactionId, name: &str, description: &str, tree: &[&str]) -> FactionInfo {
    FactionInfo {
        id,
        display_name: name.to_string(),
        description: description.to_string(),
        skill_tree: tree.iter().map(|slug| slug.to_string()).collect(),
    }
}

pub fn default_factions() -> Vec<FactionInfo> {
    vec![
        faction(
            FactionId::Dwarves,
            "Dwarven Holds",
            "Slow, sturdy towers and the war hammer.",
            &["forge", "runesmith", "deep-mines", "thunder-hammer"],
        ),
        faction(
            FactionId::Humans,
            "Kingdom of Men",
            "Cheap towers that scale with gold.",
            &["masonry", "crossbows", "tax-collector", "royal-guard"],
        ),
        faction(
            FactionId::Elves,
            "Sylvan Court",
            "Long range and fast attacks.",
            &["longbow", "moonwell", "thornwall", "starfall"],
        ),
    ]
}

impl FactionInfo {
    pub fn has_node(&self, slug: &str) -> bool {
        self.skill_tree.iter().any(|node| node == slug)
    }
}
