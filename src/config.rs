//! Core configuration, read from an optional RON file at startup.

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::LEVEL_PER_POINT;
use crate::faction::FactionId;

/// Settings for the progression core. Every field has a default, so a
/// config file only needs to list what it changes.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Where save files live. None means the per-user data directory.
    pub save_dir: Option<PathBuf>,
    pub record_prefix: String,
    pub record_extension: String,
    /// Subdirectory of the save dir holding the developer save.
    pub dev_subdir: String,
    pub level_per_point: u32,
    /// Faction selected when a session starts.
    pub starting_faction: FactionId,
    /// Start on the developer save instead of the most recent normal save.
    pub developer_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            record_prefix: "Save-".to_string(),
            record_extension: ".ron".to_string(),
            dev_subdir: "dev".to_string(),
            level_per_point: LEVEL_PER_POINT,
            starting_faction: FactionId::Dwarves,
            developer_mode: false,
        }
    }
}

impl CoreConfig {
    /// The configured save directory, else `<data dir>/hammerhold/saves`,
    /// else `./saves` when the platform has no data directory.
    pub fn resolved_save_dir(&self) -> PathBuf {
        if let Some(dir) = &self.save_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join("hammerhold").join("saves"))
            .unwrap_or_else(|| PathBuf::from("saves"))
    }
}

/// Loads the config at `path`. A missing file gives the defaults; a broken
/// one gives the defaults and a warning.
pub fn load_config(path: &Path) -> CoreConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CoreConfig::default(),
        Err(e) => {
            warn!("Failed to read config {:?}: {}. Using defaults.", path, e);
            return CoreConfig::default();
        }
    };

    let mut config: CoreConfig = match ron::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config {:?}: {}. Using defaults.", path, e);
            return CoreConfig::default();
        }
    };

    if config.level_per_point == 0 {
        warn!("level_per_point must be at least 1, using {}", LEVEL_PER_POINT);
        config.level_per_point = LEVEL_PER_POINT;
    }
    config
}
