use bevy::prelude::*;

use crate::config::CoreConfig;
use crate::constants::UNSAVED_NAME;
use crate::faction::{FactionCatalogRes, FactionId};
use crate::save_error::SaveError;
use crate::save_record::SaveRecord;
use crate::save_store::SaveStore;

pub struct SaveLoadPlugin;

impl Plugin for SaveLoadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoreConfig>()
            .add_message::<NewSaveRequested>()
            .add_message::<LoadSaveRequested>()
            .add_message::<SwitchFaction>()
            .add_message::<GainLevels>()
            .add_message::<UnlockSkillNode>()
            .add_message::<ActiveSaveChanged>()
            .add_systems(PreStartup, open_active_save)
            .add_systems(
                Update,
                (save_requests_system, switch_faction_system, progress_system).chain(),
            );
    }
}

/// The save being played. Systems mutate it in place and write it back
/// through `SaveStore::update` after each meaningful change.
#[derive(Resource, Debug, Clone)]
pub struct ActiveSave(pub SaveRecord);

/// The faction the player is currently playing.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveFaction(pub FactionId);

/// Start a new numbered save and switch to it.
#[derive(Message, Clone, Debug, Default)]
pub struct NewSaveRequested;

/// Switch to an existing save by name.
#[derive(Message, Clone, Debug)]
pub struct LoadSaveRequested {
    pub name: String,
}

#[derive(Message, Clone, Copy, Debug)]
pub struct SwitchFaction(pub FactionId);

/// Gameplay reward: raise a faction's level.
#[derive(Message, Clone, Copy, Debug)]
pub struct GainLevels {
    pub faction: FactionId,
    pub levels: u32,
}

/// Gameplay reward: unlock (or raise) a node in a faction's skill tree.
#[derive(Message, Clone, Debug)]
pub struct UnlockSkillNode {
    pub faction: FactionId,
    pub slug: String,
    pub level: u32,
}

/// Sent when the active save was replaced or the faction switched, so
/// anything derived from them (like the modifier session) starts over.
#[derive(Message, Clone, Debug)]
pub struct ActiveSaveChanged;

/// Picks the save to play: the developer save in developer mode, otherwise
/// the most recently played save, otherwise a brand new one.
pub fn choose_active_save(
    store: &mut SaveStore,
    config: &CoreConfig,
    factions: &FactionCatalogRes,
) -> Result<SaveRecord, SaveError> {
    if config.developer_mode {
        return store.developer_save(&factions.0);
    }

    match store.most_recent()? {
        Some(record) => Ok(record),
        None => store.create_new(),
    }
}

/// PreStartup: opens the store and inserts the active save, so Startup
/// systems can rely on `ActiveSave` and `ActiveFaction` existing.
fn open_active_save(
    mut commands: Commands,
    config: Res<CoreConfig>,
    factions: Res<FactionCatalogRes>,
) {
    let mut store = SaveStore::from_config(&config);

    let record = match choose_active_save(&mut store, &config, &factions) {
        Ok(record) => {
            info!("Playing save {:?}", record.name());
            record
        }
        Err(e) => {
            // Keep the game playable. The store refuses to write this name,
            // so nothing on disk can be overwritten.
            error!("Failed to open saves: {}. Progress will not be kept.", e);
            SaveRecord::new(UNSAVED_NAME)
        }
    };

    commands.insert_resource(store);
    commands.insert_resource(ActiveSave(record));
    commands.insert_resource(ActiveFaction(config.starting_faction));
}

fn save_requests_system(
    mut new_requests: MessageReader<NewSaveRequested>,
    mut load_requests: MessageReader<LoadSaveRequested>,
    mut store: ResMut<SaveStore>,
    mut save: ResMut<ActiveSave>,
    mut changed: MessageWriter<ActiveSaveChanged>,
) {
    for _ in new_requests.read() {
        match store.create_new() {
            Ok(record) => {
                save.0 = record;
                changed.write(ActiveSaveChanged);
            }
            Err(e) => error!("Failed to create save: {}", e),
        }
    }

    for request in load_requests.read() {
        match store.load(&request.name) {
            Ok(Some(record)) => {
                info!("Switched to save {:?}", record.name());
                save.0 = record;
                changed.write(ActiveSaveChanged);
            }
            Ok(None) => warn!("No save named {:?}", request.name),
            // Already logged by the store.
            Err(_) => {}
        }
    }
}

fn switch_faction_system(
    mut switches: MessageReader<SwitchFaction>,
    mut faction: ResMut<ActiveFaction>,
    mut store: ResMut<SaveStore>,
    mut save: ResMut<ActiveSave>,
    mut changed: MessageWriter<ActiveSaveChanged>,
) {
    for switch in switches.read() {
        if faction.0 == switch.0 {
            continue;
        }
        faction.0 = switch.0;
        if let Err(e) = store.update(&mut save.0) {
            error!("Failed to save on faction switch: {}", e);
        }
        changed.write(ActiveSaveChanged);
    }
}

/// Applies level and skill-node rewards to the active save and writes it back.
fn progress_system(
    mut levels: MessageReader<GainLevels>,
    mut unlocks: MessageReader<UnlockSkillNode>,
    mut store: ResMut<SaveStore>,
    mut save: ResMut<ActiveSave>,
    factions: Res<FactionCatalogRes>,
) {
    let mut dirty = false;

    for gain in levels.read() {
        let progress = save.0.progress_mut(gain.faction);
        let target = progress.level().saturating_add(gain.levels);
        dirty |= progress.raise_level(target);
    }

    for unlock in unlocks.read() {
        let known = factions
            .0
            .lookup(&unlock.faction)
            .map(|info| info.has_node(&unlock.slug))
            .unwrap_or(false);
        if !known {
            warn!("{:?} has no skill node {:?}", unlock.faction, unlock.slug);
            continue;
        }
        dirty |= save
            .0
            .progress_mut(unlock.faction)
            .unlock_node(&unlock.slug, unlock.level);
    }

    if dirty {
        if let Err(e) = store.update(&mut save.0) {
            error!("Failed to save progress: {}", e);
        }
    }
}
