// constants.rs - Progression tuning shared by saves, budgets and the dev save.

/// Highest level a faction can reach.
pub const MAX_LEVEL: u32 = 30;

/// Faction levels needed to earn one modifier point.
/// `CoreConfig::level_per_point` overrides this at runtime.
pub const LEVEL_PER_POINT: u32 = 5;

/// Name given to the always-available developer save.
pub const DEV_SAVE_NAME: &str = "DevSave";

/// Level every skill node is unlocked at in the developer save.
pub const DEV_SAVE_NODE_LEVEL: u32 = 3;

/// Name of the in-memory record used when the save directory cannot be
/// opened. It maps to no file, so the store refuses to write it.
pub const UNSAVED_NAME: &str = "Unsaved";
