//! Progression core for a tower-defense game: save records and the store
//! they live in, catalogs of factions, towers and skill modifiers, tower
//! upgrades, and modifier-point budgets. Exposed as Bevy plugins.

pub mod authoring;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod faction;
pub mod modifier_budget;
pub mod save_error;
pub mod save_load;
pub mod save_record;
pub mod save_store;
pub mod skill_modifier;
pub mod tower;

use bevy::prelude::*;

use crate::config::CoreConfig;

/// Adds every core plugin with the given configuration.
#[derive(Default)]
pub struct CorePlugins {
    pub config: CoreConfig,
}

impl CorePlugins {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }
}

impl Plugin for CorePlugins {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone()).add_plugins((
            authoring::CatalogPlugin,
            save_load::SaveLoadPlugin,
            modifier_budget::ModifierPlugin,
            tower::TowerPlugin,
        ));
    }
}
