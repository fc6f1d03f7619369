use bevy::prelude::*;

use crate::faction::{FactionAuthoring, FactionCatalog, FactionCatalogRes};
use crate::skill_modifier::{ModifierAuthoring, ModifierCatalog, ModifierCatalogRes};
use crate::tower::{TowerAuthoring, TowerCatalog, TowerCatalogRes};

pub struct CatalogPlugin;

impl Plugin for CatalogPlugin {
    fn build(&self, app: &mut App) {
        // Authoring data is static and defined in code, so the catalogs can be
        // built right here instead of in a startup system. Anything inserted
        // before this plugin (a test fixture, an editor) is kept.
        app.init_resource::<FactionAuthoring>()
            .init_resource::<TowerAuthoring>()
            .init_resource::<ModifierAuthoring>();

        let world = app.world();
        let factions = FactionCatalog::from_entries(world.resource::<FactionAuthoring>().0.clone());
        let towers = TowerCatalog::from_entries(world.resource::<TowerAuthoring>().0.clone());
        let modifiers =
            ModifierCatalog::from_entries(world.resource::<ModifierAuthoring>().0.clone());

        app.insert_resource(FactionCatalogRes(factions))
            .insert_resource(TowerCatalogRes(towers))
            .insert_resource(ModifierCatalogRes(modifiers))
            .add_systems(
                PreUpdate,
                (
                    rebuild_faction_catalog.run_if(resource_changed::<FactionAuthoring>),
                    rebuild_tower_catalog.run_if(resource_changed::<TowerAuthoring>),
                    rebuild_modifier_catalog.run_if(resource_changed::<ModifierAuthoring>),
                ),
            );
    }
}

// Catalogs are only rebuilt when someone edits the authoring resources
// (hot reload in an editor). Gameplay never writes to them.

fn rebuild_faction_catalog(authoring: Res<FactionAuthoring>, mut catalog: ResMut<FactionCatalogRes>) {
    catalog.0.rebuild(authoring.0.clone());
    debug!("Rebuilt faction catalog ({} entries)", catalog.0.len());
}

fn rebuild_tower_catalog(authoring: Res<TowerAuthoring>, mut catalog: ResMut<TowerCatalogRes>) {
    catalog.0.rebuild(authoring.0.clone());
    debug!("Rebuilt tower catalog ({} entries)", catalog.0.len());
}

fn rebuild_modifier_catalog(
    authoring: Res<ModifierAuthoring>,
    mut catalog: ResMut<ModifierCatalogRes>,
) {
    catalog.0.rebuild(authoring.0.clone());
    debug!("Rebuilt modifier catalog ({} entries)", catalog.0.len());
}
