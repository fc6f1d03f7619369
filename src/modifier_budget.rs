use bevy::prelude::*;

use crate::config::CoreConfig;
use crate::faction::FactionId;
use crate::save_error::SaveError;
use crate::save_load::{ActiveFaction, ActiveSave, ActiveSaveChanged};
use crate::save_record::SaveRecord;
use crate::save_store::{RecordSink, SaveStore};
use crate::skill_modifier::{ModifierCatalog, ModifierCatalogRes, ModifierId};

pub struct ModifierPlugin;

impl Plugin for ModifierPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoreConfig>()
            .add_message::<ToggleModifier>()
            .add_message::<ModifierBudgetChanged>()
            .add_systems(Startup, start_modifier_session)
            .add_systems(
                Update,
                (restart_modifier_session, toggle_modifier_system)
                    .chain()
                    .run_if(resource_exists::<ActiveModifierSession>),
            );
    }
}

// =============================================================================
// POINT BUDGET
// =============================================================================

/// Modifier points for one faction in one session.
///
/// `assigned + available() == max_points` always holds, and neither side
/// goes below zero: `spend` and `refund` refuse instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointBudget {
    max_points: u32,
    assigned: u32,
}

impl PointBudget {
    pub fn new(max_points: u32) -> Self {
        Self {
            max_points,
            assigned: 0,
        }
    }

    /// One point per `level_per_point` faction levels, rounded down.
    pub fn from_level(level: u32, level_per_point: u32) -> Self {
        Self::new(level / level_per_point.max(1))
    }

    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    pub fn assigned(&self) -> u32 {
        self.assigned
    }

    pub fn available(&self) -> u32 {
        self.max_points - self.assigned
    }

    /// Takes one point. False (and nothing changes) when none are left.
    pub fn spend(&mut self) -> bool {
        if self.available() == 0 {
            return false;
        }
        self.assigned += 1;
        true
    }

    /// Gives one point back. False when nothing is assigned.
    pub fn refund(&mut self) -> bool {
        if self.assigned == 0 {
            return false;
        }
        self.assigned -= 1;
        true
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Point bookkeeping for the faction currently being played.
///
/// The maximum is fixed when the session starts; levelling up mid-session
/// does not grant new points until the next session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierSession {
    faction: FactionId,
    budget: PointBudget,
    replay_changed: bool,
}

impl ModifierSession {
    /// Starts a session for `faction`, replaying its saved activations.
    ///
    /// Modifiers whose skill node is locked are switched off and cost
    /// nothing. Point-costing modifiers are restored while points remain;
    /// any beyond that are switched off too. If anything was switched off,
    /// `replay_changed()` is true and the record should be written back.
    pub fn start(
        faction: FactionId,
        record: &mut SaveRecord,
        catalog: &ModifierCatalog,
        level_per_point: u32,
    ) -> Self {
        // Other factions are not replayed, but their sets must still obey
        // the unlocked-node rule before the record is written back.
        let pruned = record.prune_locked(catalog);
        for (owner, id) in &pruned {
            debug!("{:?} of {:?} is locked behind its skill node", id, owner);
        }
        let mut replay_changed = !pruned.is_empty();

        let progress = record.progress_mut(faction);
        let mut budget = PointBudget::from_level(progress.level(), level_per_point);

        let saved: Vec<ModifierId> = progress.activated_modifiers().iter().copied().collect();
        for id in saved {
            let restored = match catalog.lookup(&id) {
                Ok(info) if info.faction != faction => {
                    warn!("{:?} belongs to {:?}, not {:?}", id, info.faction, faction);
                    false
                }
                Ok(info) if !progress.is_node_unlocked(&info.governing_node) => {
                    debug!("{:?} is locked behind {:?}", id, info.governing_node);
                    false
                }
                Ok(info) if info.costs_point => {
                    let spent = budget.spend();
                    if !spent {
                        warn!("No modifier points left to restore {:?}", id);
                    }
                    spent
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("Dropping saved modifier: {}", e);
                    false
                }
            };

            if !restored {
                progress.deactivate(id);
                replay_changed = true;
            }
        }

        info!(
            "Modifier session for {:?}: {}/{} points assigned",
            faction,
            budget.assigned(),
            budget.max_points()
        );

        Self {
            faction,
            budget,
            replay_changed,
        }
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    pub fn budget(&self) -> PointBudget {
        self.budget
    }

    pub fn available(&self) -> u32 {
        self.budget.available()
    }

    pub fn assigned(&self) -> u32 {
        self.budget.assigned()
    }

    pub fn max_points(&self) -> u32 {
        self.budget.max_points()
    }

    /// True if starting the session switched off saved activations.
    pub fn replay_changed(&self) -> bool {
        self.replay_changed
    }

    /// Switches `id` on, spending a point if it costs one, and persists the record.
    ///
    /// `Ok(false)` means nothing happened: unknown or foreign modifier,
    /// locked node, already active, or no points left. If persisting fails
    /// the change is rolled back before the error is returned.
    pub fn activate(
        &mut self,
        id: ModifierId,
        record: &mut SaveRecord,
        catalog: &ModifierCatalog,
        sink: &mut impl RecordSink,
    ) -> Result<bool, SaveError> {
        let Ok(info) = catalog.lookup(&id) else {
            return Ok(false);
        };
        if info.faction != self.faction {
            return Ok(false);
        }

        let progress = record.progress_mut(self.faction);
        if progress.is_activated(id) || !progress.is_node_unlocked(&info.governing_node) {
            return Ok(false);
        }
        if info.costs_point && !self.budget.spend() {
            return Ok(false);
        }
        progress.activate(info);

        if let Err(e) = sink.persist(record) {
            record.progress_mut(self.faction).deactivate(id);
            if info.costs_point {
                self.budget.refund();
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Switches `id` off, refunding its point, and persists the record.
    /// `Ok(false)` when it was not active.
    pub fn deactivate(
        &mut self,
        id: ModifierId,
        record: &mut SaveRecord,
        catalog: &ModifierCatalog,
        sink: &mut impl RecordSink,
    ) -> Result<bool, SaveError> {
        let costs_point = catalog.lookup(&id).map(|info| info.costs_point).unwrap_or(false);

        if !record.progress_mut(self.faction).deactivate(id) {
            return Ok(false);
        }
        if costs_point && !self.budget.refund() {
            // An active point-costing modifier always holds a point.
            warn!("{:?} was active with no point assigned", id);
        }

        if let Err(e) = sink.persist(record) {
            if let Ok(info) = catalog.lookup(&id) {
                record.progress_mut(self.faction).activate(info);
            }
            if costs_point {
                self.budget.spend();
            }
            return Err(e);
        }
        Ok(true)
    }
}

// =============================================================================
// ECS
// =============================================================================

#[derive(Resource, Debug, Clone)]
pub struct ActiveModifierSession(pub ModifierSession);

/// Sent by the UI when the player flips a modifier on or off.
#[derive(Message, Clone, Debug)]
pub struct ToggleModifier {
    pub id: ModifierId,
    pub activate: bool,
}

/// Sent whenever the point counts may have changed, for the UI to redraw.
#[derive(Message, Clone, Debug, PartialEq, Eq)]
pub struct ModifierBudgetChanged {
    pub faction: FactionId,
    pub available: u32,
    pub assigned: u32,
}

impl From<&ModifierSession> for ModifierBudgetChanged {
    fn from(session: &ModifierSession) -> Self {
        Self {
            faction: session.faction(),
            available: session.available(),
            assigned: session.assigned(),
        }
    }
}

fn begin_session(
    faction: FactionId,
    save: &mut ActiveSave,
    store: &mut SaveStore,
    catalog: &ModifierCatalog,
    config: &CoreConfig,
) -> ModifierSession {
    let session = ModifierSession::start(faction, &mut save.0, catalog, config.level_per_point);
    if session.replay_changed() {
        if let Err(e) = store.update(&mut save.0) {
            error!("Failed to save pruned modifiers: {}", e);
        }
    }
    session
}

fn start_modifier_session(
    mut commands: Commands,
    mut save: ResMut<ActiveSave>,
    mut store: ResMut<SaveStore>,
    faction: Res<ActiveFaction>,
    catalog: Res<ModifierCatalogRes>,
    config: Res<CoreConfig>,
    mut budget_changed: MessageWriter<ModifierBudgetChanged>,
) {
    let session = begin_session(faction.0, &mut save, &mut store, &catalog.0, &config);
    budget_changed.write(ModifierBudgetChanged::from(&session));
    commands.insert_resource(ActiveModifierSession(session));
}

/// A different save or faction means a fresh session.
fn restart_modifier_session(
    mut changes: MessageReader<ActiveSaveChanged>,
    mut session: ResMut<ActiveModifierSession>,
    mut save: ResMut<ActiveSave>,
    mut store: ResMut<SaveStore>,
    faction: Res<ActiveFaction>,
    catalog: Res<ModifierCatalogRes>,
    config: Res<CoreConfig>,
    mut budget_changed: MessageWriter<ModifierBudgetChanged>,
) {
    if changes.read().count() == 0 {
        return;
    }
    session.0 = begin_session(faction.0, &mut save, &mut store, &catalog.0, &config);
    budget_changed.write(ModifierBudgetChanged::from(&session.0));
}

fn toggle_modifier_system(
    mut toggles: MessageReader<ToggleModifier>,
    mut session: ResMut<ActiveModifierSession>,
    mut save: ResMut<ActiveSave>,
    mut store: ResMut<SaveStore>,
    catalog: Res<ModifierCatalogRes>,
    mut budget_changed: MessageWriter<ModifierBudgetChanged>,
) {
    for toggle in toggles.read() {
        let result = if toggle.activate {
            session
                .0
                .activate(toggle.id, &mut save.0, &catalog.0, &mut *store)
        } else {
            session
                .0
                .deactivate(toggle.id, &mut save.0, &catalog.0, &mut *store)
        };

        match result {
            Ok(true) => {
                budget_changed.write(ModifierBudgetChanged::from(&session.0));
            }
            Ok(false) => debug!("Ignored modifier toggle {:?}", toggle),
            Err(e) => error!("Failed to save modifier change: {}", e),
        }
    }
}
