//! Drives the core plugins in a headless App against a temporary save dir.

use bevy::ecs::message::Messages;
use bevy::prelude::*;
use tempfile::TempDir;

use hammerhold::config::CoreConfig;
use hammerhold::constants::{MAX_LEVEL, UNSAVED_NAME};
use hammerhold::faction::FactionId;
use hammerhold::modifier_budget::{ActiveModifierSession, ToggleModifier};
use hammerhold::save_load::{
    ActiveFaction, ActiveSave, GainLevels, NewSaveRequested, SwitchFaction, UnlockSkillNode,
};
use hammerhold::save_store::SaveStore;
use hammerhold::skill_modifier::ModifierId;
use hammerhold::tower::{
    Tower, TowerCatalogRes, TowerType, TowerUpgraded, UpgradeTowerRequest,
};
use hammerhold::CorePlugins;

fn test_app(dir: &TempDir, config: CoreConfig) -> App {
    let config = CoreConfig {
        save_dir: Some(dir.path().join("saves")),
        ..config
    };
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, CorePlugins::new(config)));
    // First update runs PreStartup/Startup and one Update.
    app.update();
    app
}

fn reload(dir: &TempDir, name: &str) -> hammerhold::save_record::SaveRecord {
    SaveStore::new(dir.path().join("saves"))
        .load(name)
        .unwrap()
        .unwrap()
}

#[test]
fn first_run_creates_a_save() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir, CoreConfig::default());

    assert_eq!(app.world().resource::<ActiveSave>().0.name(), "Save-1");
    assert_eq!(
        app.world().resource::<ActiveFaction>().0,
        FactionId::Dwarves
    );
    let session = &app.world().resource::<ActiveModifierSession>().0;
    assert_eq!(session.max_points(), 0);
}

#[test]
fn second_run_resumes_the_existing_save() {
    let dir = TempDir::new().unwrap();
    drop(test_app(&dir, CoreConfig::default()));
    let app = test_app(&dir, CoreConfig::default());

    assert_eq!(app.world().resource::<ActiveSave>().0.name(), "Save-1");
    let mut store = SaveStore::new(dir.path().join("saves"));
    assert_eq!(store.count_records().unwrap(), 1);
}

#[test]
fn rewards_and_modifier_toggles_are_persisted() {
    let dir = TempDir::new().unwrap();
    let mut app = test_app(&dir, CoreConfig::default());

    app.world_mut().write_message(GainLevels {
        faction: FactionId::Dwarves,
        levels: 12,
    });
    app.world_mut().write_message(UnlockSkillNode {
        faction: FactionId::Dwarves,
        slug: "forge".to_string(),
        level: 1,
    });
    app.update();

    // Points are fixed for the session; switching faction away and back restarts it.
    app.world_mut().write_message(SwitchFaction(FactionId::Elves));
    app.update();
    app.world_mut().write_message(SwitchFaction(FactionId::Dwarves));
    app.update();
    app.update();

    let session = &app.world().resource::<ActiveModifierSession>().0;
    assert_eq!(session.faction(), FactionId::Dwarves);
    assert_eq!(session.max_points(), 2);

    app.world_mut().write_message(ToggleModifier {
        id: ModifierId::TemperedSteel,
        activate: true,
    });
    app.update();

    assert_eq!(
        app.world().resource::<ActiveModifierSession>().0.available(),
        1
    );
    let saved = reload(&dir, "Save-1");
    let dwarves = saved.progress(FactionId::Dwarves).unwrap();
    assert_eq!(dwarves.level(), 12);
    assert!(dwarves.is_activated(ModifierId::TemperedSteel));
}

#[test]
fn new_save_request_switches_to_a_fresh_record() {
    let dir = TempDir::new().unwrap();
    let mut app = test_app(&dir, CoreConfig::default());

    app.world_mut().write_message(NewSaveRequested);
    app.update();

    assert_eq!(app.world().resource::<ActiveSave>().0.name(), "Save-2");
}

#[test]
fn developer_mode_plays_the_developer_save() {
    let dir = TempDir::new().unwrap();
    let app = test_app(
        &dir,
        CoreConfig {
            developer_mode: true,
            ..default()
        },
    );

    let save = &app.world().resource::<ActiveSave>().0;
    assert_eq!(save.name(), "DevSave");
    assert_eq!(save.progress(FactionId::Elves).unwrap().level(), MAX_LEVEL);
    assert_eq!(
        app.world().resource::<ActiveModifierSession>().0.max_points(),
        MAX_LEVEL / 5
    );
}

#[test]
fn tower_upgrade_requests_emit_costs() {
    let dir = TempDir::new().unwrap();
    let mut app = test_app(&dir, CoreConfig::default());

    let tower = {
        let catalog = &app.world().resource::<TowerCatalogRes>().0;
        Tower::new(catalog, TowerType::Cannon, 2).unwrap()
    };
    let entity = app.world_mut().spawn(tower).id();

    app.world_mut().write_message(UpgradeTowerRequest { entity });
    app.update();
    // Capped at level 2: this one is ignored.
    app.world_mut().write_message(UpgradeTowerRequest { entity });
    app.update();

    assert_eq!(app.world().get::<Tower>(entity).unwrap().level, 2);

    let messages = app.world().resource::<Messages<TowerUpgraded>>();
    let mut cursor = messages.get_cursor();
    let upgrades: Vec<_> = cursor.read(messages).map(|m| m.upgrade.cost).collect();
    assert_eq!(upgrades, vec![80]);
}

#[test]
fn unopenable_store_plays_an_unsaved_record() {
    let dir = TempDir::new().unwrap();
    // A plain file where the save directory's parent should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let config = CoreConfig {
        save_dir: Some(blocker.join("saves")),
        ..default()
    };
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, CorePlugins::new(config)));
    app.update();

    assert_eq!(app.world().resource::<ActiveSave>().0.name(), UNSAVED_NAME);

    app.world_mut().write_message(GainLevels {
        faction: FactionId::Dwarves,
        levels: 3,
    });
    app.update();

    let save = &app.world().resource::<ActiveSave>().0;
    assert_eq!(save.progress(FactionId::Dwarves).unwrap().level(), 3);
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
}
