use std::path::PathBuf;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use hammerhold::config::load_config;
use hammerhold::faction::FactionCatalogRes;
use hammerhold::modifier_budget::ActiveModifierSession;
use hammerhold::save_load::{ActiveFaction, ActiveSave};
use hammerhold::CorePlugins;

/// Boots the progression core headless, reports the active save and exits.
/// Usage: hammerhold [config.ron]
fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("hammerhold.ron"));
    let config = load_config(&config_path);

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_once()),
            LogPlugin::default(),
            CorePlugins::new(config),
        ))
        .add_systems(PostStartup, report_progress)
        .run();
}

fn report_progress(
    save: Res<ActiveSave>,
    faction: Res<ActiveFaction>,
    factions: Res<FactionCatalogRes>,
    session: Option<Res<ActiveModifierSession>>,
) {
    info!("Save {:?}, last played {}", save.0.name(), save.0.last_played());

    for (id, progress) in save.0.factions() {
        let name = factions
            .0
            .lookup(&id)
            .map(|info| info.display_name.as_str())
            .unwrap_or("<unknown>");
        info!(
            "  {}: level {}, {} skill node(s), {} modifier(s) active",
            name,
            progress.level(),
            progress.skill_nodes().len(),
            progress.activated_modifiers().len()
        );
    }

    if let Some(session) = session {
        info!(
            "Playing {:?} with {}/{} modifier points free",
            faction.0,
            session.0.available(),
            session.0.max_points()
        );
    }
}
