// save_store.rs - File-backed store of save records.
//
// Layout on disk:
//   <base>/Save-1.ron, <base>/Save-2.ron, ...   normal saves
//   <base>/dev/DevSave.ron                       developer save
//
// Every write goes to `<file>.tmp` first and is renamed into place, so a
// crash mid-write leaves the previous version intact and a directory scan
// never sees half a file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bevy::prelude::*;

use crate::config::CoreConfig;
use crate::constants::{DEV_SAVE_NAME, MAX_LEVEL};
use crate::faction::{FactionCatalog, FactionId};
use crate::save_error::SaveError;
use crate::save_record::{FactionProgress, SaveRecord};

/// Anything that can write a record back to storage.
///
/// The modifier session persists through this instead of holding a
/// SaveStore, so it can be tested against an in-memory sink.
pub trait RecordSink {
    fn persist(&mut self, record: &mut SaveRecord) -> Result<(), SaveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreState {
    Uninitialized,
    Ready,
}

/// Result of reading every record in the store.
#[derive(Debug, Default)]
pub struct StoreScan {
    /// Records that parsed, ordered by their numeric suffix.
    pub records: Vec<SaveRecord>,
    /// Files that look like records but could not be read or parsed.
    pub skipped: Vec<PathBuf>,
}

#[derive(Resource, Debug)]
pub struct SaveStore {
    base_dir: PathBuf,
    prefix: String,
    extension: String,
    dev_subdir: String,
    state: StoreState,
}

impl SaveStore {
    /// A store rooted at `base_dir` with the default naming scheme.
    /// Nothing touches the disk until the first operation.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let defaults = CoreConfig::default();
        Self {
            base_dir: base_dir.into(),
            prefix: defaults.record_prefix,
            extension: defaults.record_extension,
            dev_subdir: defaults.dev_subdir,
            state: StoreState::Uninitialized,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            base_dir: config.resolved_save_dir(),
            prefix: config.record_prefix.clone(),
            extension: config.record_extension.clone(),
            dev_subdir: config.dev_subdir.clone(),
            state: StoreState::Uninitialized,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_ready(&self) -> bool {
        self.state == StoreState::Ready
    }

    /// Creates the base directory if needed. Safe to call any number of times.
    pub fn ensure_ready(&mut self) -> Result<(), SaveError> {
        if self.state == StoreState::Ready {
            return Ok(());
        }
        fs::create_dir_all(&self.base_dir).map_err(|e| SaveError::io(&self.base_dir, e))?;
        info!("Save store ready at {:?}", self.base_dir);
        self.state = StoreState::Ready;
        Ok(())
    }

    /// The numeric suffix of a record name or file name (`Save-7` or
    /// `Save-7.ron` both give 7). None for anything else, including `Save-0`.
    pub fn parse_suffix(&self, name: &str) -> Option<u32> {
        let rest = name.strip_prefix(self.prefix.as_str())?;
        let digits = rest.strip_suffix(self.extension.as_str()).unwrap_or(rest);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().filter(|&n| n > 0)
    }

    fn record_name(&self, suffix: u32) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    fn dev_save_path(&self) -> PathBuf {
        self.base_dir
            .join(&self.dev_subdir)
            .join(format!("{}{}", DEV_SAVE_NAME, self.extension))
    }

    /// Where the record called `name` lives. Names that are neither a
    /// numbered save nor the developer save are refused.
    fn path_for(&self, name: &str) -> Result<PathBuf, SaveError> {
        if name == DEV_SAVE_NAME {
            return Ok(self.dev_save_path());
        }
        match self.parse_suffix(name) {
            Some(_) if !name.ends_with(self.extension.as_str()) => {
                Ok(self.base_dir.join(format!("{}{}", name, self.extension)))
            }
            _ => Err(SaveError::InvalidName(name.to_string())),
        }
    }

    /// Record files in the base directory with their suffixes, sorted by suffix.
    /// Other files are left alone.
    fn record_files(&mut self) -> Result<Vec<(u32, PathBuf)>, SaveError> {
        self.ensure_ready()?;

        let entries = fs::read_dir(&self.base_dir).map_err(|e| SaveError::io(&self.base_dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SaveError::io(&self.base_dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let suffix = path
                .file_name()
                .and_then(|name| name.to_str())
                .filter(|name| name.ends_with(self.extension.as_str()))
                .and_then(|name| self.parse_suffix(name));

            match suffix {
                Some(suffix) => files.push((suffix, path)),
                None => debug!("Ignoring non-save file {:?}", path),
            }
        }

        files.sort_by_key(|(suffix, _)| *suffix);
        Ok(files)
    }

    pub fn count_records(&mut self) -> Result<usize, SaveError> {
        Ok(self.record_files()?.len())
    }

    /// Reads every record. A file that fails to read or parse is skipped with
    /// a warning; it never stops the rest of the store from loading.
    pub fn scan(&mut self) -> Result<StoreScan, SaveError> {
        let mut scan = StoreScan::default();

        for (suffix, path) in self.record_files()? {
            match read_record(&path) {
                Ok(record) if self.parse_suffix(record.name()) == Some(suffix) => {
                    scan.records.push(record)
                }
                Ok(record) => {
                    warn!(
                        "Skipping {:?}: it holds a record named {:?}",
                        path,
                        record.name()
                    );
                    scan.skipped.push(path);
                }
                Err(e) => {
                    warn!("Skipping unreadable save: {}", e);
                    scan.skipped.push(path);
                }
            }
        }

        Ok(scan)
    }

    pub fn list_all(&mut self) -> Result<Vec<SaveRecord>, SaveError> {
        Ok(self.scan()?.records)
    }

    /// The listed record played most recently.
    pub fn most_recent(&mut self) -> Result<Option<SaveRecord>, SaveError> {
        Ok(self
            .list_all()?
            .into_iter()
            .max_by(|a, b| a.last_played().cmp(b.last_played())))
    }

    /// Creates and writes a new record named one past the highest existing suffix.
    pub fn create_new(&mut self) -> Result<SaveRecord, SaveError> {
        let next = match self.record_files()?.last() {
            Some((suffix, _)) => suffix
                .checked_add(1)
                .ok_or_else(|| SaveError::NumbersExhausted(self.record_name(*suffix)))?,
            None => 1,
        };

        let record = SaveRecord::new(self.record_name(next));
        let path = self.path_for(record.name())?;
        write_record(&path, &record)?;
        info!("Created save {:?}", record.name());
        Ok(record)
    }

    /// Loads `name`. `Ok(None)` when there is no such file; a file that
    /// exists but does not parse is logged and returned as `SaveError::Parse`.
    pub fn load(&mut self, name: &str) -> Result<Option<SaveRecord>, SaveError> {
        self.ensure_ready()?;
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }

        match read_record(&path) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                error!("Failed to load save {:?}: {}", name, e);
                Err(e)
            }
        }
    }

    /// Stamps `last_played` and writes the record over its file. On failure
    /// the record is left exactly as it was passed in.
    pub fn update(&mut self, record: &mut SaveRecord) -> Result<(), SaveError> {
        self.ensure_ready()?;
        let path = self.path_for(record.name())?;
        let mut stamped = record.clone();
        stamped.touch();
        write_record(&path, &stamped)?;
        *record = stamped;
        debug!("Saved {:?}", record.name());
        Ok(())
    }

    /// Removes a numbered save. Returns false if it was not there.
    pub fn delete(&mut self, name: &str) -> Result<bool, SaveError> {
        self.ensure_ready()?;
        if name == DEV_SAVE_NAME {
            return Err(SaveError::InvalidName(name.to_string()));
        }
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted save {:?}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SaveError::io(path, e)),
        }
    }

    /// The developer save: every faction at max level with its whole skill
    /// tree unlocked. Created on first request; recreated if it no longer parses.
    pub fn developer_save(&mut self, factions: &FactionCatalog) -> Result<SaveRecord, SaveError> {
        self.ensure_ready()?;
        let path = self.dev_save_path();

        if path.exists() {
            match read_record(&path) {
                Ok(record) => return Ok(record),
                Err(e) => warn!("Developer save is unreadable, recreating it: {}", e),
            }
        }

        let mut record = SaveRecord::new(DEV_SAVE_NAME);
        for id in FactionId::ALL {
            let progress = record.progress_mut(id);
            match factions.lookup(&id) {
                Ok(info) => *progress = FactionProgress::maxed(info),
                Err(_) => {
                    progress.raise_level(MAX_LEVEL);
                }
            }
        }

        write_record(&path, &record)?;
        info!("Created developer save at {:?}", path);
        Ok(record)
    }
}

impl RecordSink for SaveStore {
    fn persist(&mut self, record: &mut SaveRecord) -> Result<(), SaveError> {
        self.update(record)
    }
}

fn read_record(path: &Path) -> Result<SaveRecord, SaveError> {
    let contents = fs::read_to_string(path).map_err(|e| SaveError::io(path, e))?;
    let mut record: SaveRecord = ron::from_str(&contents).map_err(|source| SaveError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    record.fill_missing_factions();
    for faction in record.clamp_levels() {
        warn!(
            "{:?} in {:?} was above level {}, clamped",
            faction, path, MAX_LEVEL
        );
    }
    Ok(record)
}

fn write_record(path: &Path, record: &SaveRecord) -> Result<(), SaveError> {
    let serialized = ron::ser::to_string_pretty(record, ron::ser::PrettyConfig::default())?;
    atomic_write(path, serialized.as_bytes()).map_err(|e| SaveError::io(path, e))
}

/// Writes `data` to `<path>.tmp`, flushes it, then renames it over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let result = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNSAVED_NAME;
    use crate::faction::default_factions;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, SaveStore) {
        let dir = TempDir::new().unwrap();
        let store = SaveStore::new(dir.path().join("saves"));
        (dir, store)
    }

    #[test]
    fn store_directory_is_created_on_first_use() {
        let (_dir, mut store) = setup_store();
        assert!(!store.is_ready());
        assert!(!store.base_dir().exists());

        assert_eq!(store.count_records().unwrap(), 0);
        assert!(store.is_ready());
        assert!(store.base_dir().is_dir());
    }

    #[test]
    fn create_new_names_are_strictly_increasing() {
        let (_dir, mut store) = setup_store();
        let names: Vec<String> = (0..4)
            .map(|_| store.create_new().unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["Save-1", "Save-2", "Save-3", "Save-4"]);
        assert_eq!(store.count_records().unwrap(), 4);
    }

    #[test]
    fn create_new_continues_after_the_highest_suffix() {
        let (_dir, mut store) = setup_store();
        store.create_new().unwrap();
        store.create_new().unwrap();
        store.create_new().unwrap();
        assert!(store.delete("Save-2").unwrap());

        assert_eq!(store.create_new().unwrap().name(), "Save-4");
    }

    #[test]
    fn create_new_refuses_when_numbers_run_out() {
        let (_dir, mut store) = setup_store();
        store.ensure_ready().unwrap();
        let last = format!("Save-{}.ron", u32::MAX);
        fs::write(store.base_dir().join(&last), "junk").unwrap();

        assert!(matches!(
            store.create_new(),
            Err(SaveError::NumbersExhausted(_))
        ));
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn levels_above_the_cap_are_clamped_on_load() {
        let (_dir, mut store) = setup_store();
        store.ensure_ready().unwrap();
        fs::write(
            store.base_dir().join("Save-1.ron"),
            r#"(
                name: "Save-1",
                last_played: "2026-01-01T00:00:00.000Z",
                factions: { Dwarves: (level: 999) },
            )"#,
        )
        .unwrap();

        let loaded = store.load("Save-1").unwrap().unwrap();
        assert_eq!(loaded.progress(FactionId::Dwarves).unwrap().level(), MAX_LEVEL);

        let scanned = store.scan().unwrap();
        assert_eq!(
            scanned.records[0].progress(FactionId::Dwarves).unwrap().level(),
            MAX_LEVEL
        );
    }

    #[test]
    fn corrupt_files_are_skipped_not_fatal() {
        let (_dir, mut store) = setup_store();
        store.create_new().unwrap();
        store.create_new().unwrap();
        fs::write(store.base_dir().join("Save-3.ron"), "(name: \"Save-3\", ").unwrap();

        let scan = store.scan().unwrap();
        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.skipped, vec![store.base_dir().join("Save-3.ron")]);

        // The corrupt file still reserves its number.
        assert_eq!(store.create_new().unwrap().name(), "Save-4");
    }

    #[test]
    fn unrelated_files_are_ignored_and_kept() {
        let (_dir, mut store) = setup_store();
        store.create_new().unwrap();
        store.ensure_ready().unwrap();
        let stray = store.base_dir().join("notes.txt");
        fs::write(&stray, "hello").unwrap();
        fs::write(store.base_dir().join("Save-x.ron"), "junk").unwrap();
        fs::write(store.base_dir().join("Save-0.ron"), "junk").unwrap();

        assert_eq!(store.count_records().unwrap(), 1);
        let scan = store.scan().unwrap();
        assert_eq!(scan.records.len(), 1);
        assert!(scan.skipped.is_empty());
        assert!(stray.exists());
    }

    #[test]
    fn record_with_mismatched_name_is_skipped() {
        let (_dir, mut store) = setup_store();
        let record = store.create_new().unwrap();
        fs::copy(
            store.base_dir().join("Save-1.ron"),
            store.base_dir().join("Save-9.ron"),
        )
        .unwrap();

        let scan = store.scan().unwrap();
        assert_eq!(scan.records, vec![record]);
        assert_eq!(scan.skipped.len(), 1);
    }

    #[test]
    fn load_missing_record_is_none() {
        let (_dir, mut store) = setup_store();
        assert!(store.load("Save-12").unwrap().is_none());
    }

    #[test]
    fn load_malformed_record_is_parse_error() {
        let (_dir, mut store) = setup_store();
        store.ensure_ready().unwrap();
        fs::write(store.base_dir().join("Save-1.ron"), "garbage").unwrap();
        assert!(matches!(store.load("Save-1"), Err(SaveError::Parse { .. })));
    }

    #[test]
    fn invalid_names_are_refused() {
        let (_dir, mut store) = setup_store();
        assert!(matches!(
            store.load("../escape"),
            Err(SaveError::InvalidName(_))
        ));
        assert!(matches!(
            store.load("Save-1.ron"),
            Err(SaveError::InvalidName(_))
        ));
    }

    #[test]
    fn update_then_load_round_trips_and_advances_timestamp() {
        let (_dir, mut store) = setup_store();
        let mut record = store.create_new().unwrap();
        record.set_last_played("2000-01-01T00:00:00.000Z");
        record.progress_mut(FactionId::Humans).raise_level(7);
        record.progress_mut(FactionId::Humans).unlock_node("masonry", 1);

        store.update(&mut record).unwrap();
        let loaded = store.load(record.name()).unwrap().unwrap();

        assert!(loaded.last_played() > "2000-01-01T00:00:00.000Z");
        assert_eq!(loaded, record);
        assert_eq!(loaded.progress(FactionId::Humans).unwrap().level(), 7);
    }

    #[test]
    fn update_leaves_no_temp_file() {
        let (_dir, mut store) = setup_store();
        let mut record = store.create_new().unwrap();
        store.update(&mut record).unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.base_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_update_keeps_timestamp_and_cleans_up() {
        let (_dir, mut store) = setup_store();
        let mut record = store.create_new().unwrap();
        record.set_last_played("2000-01-01T00:00:00.000Z");

        // A non-empty directory where the file should be makes the rename fail.
        let path = store.base_dir().join("Save-1.ron");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(matches!(store.update(&mut record), Err(SaveError::Io { .. })));
        assert_eq!(record.last_played(), "2000-01-01T00:00:00.000Z");
        assert!(!store.base_dir().join("Save-1.ron.tmp").exists());
    }

    #[test]
    fn unsaved_record_is_never_written() {
        let (_dir, mut store) = setup_store();
        let mut record = SaveRecord::new(UNSAVED_NAME);

        assert!(matches!(
            store.update(&mut record),
            Err(SaveError::InvalidName(_))
        ));
        assert_eq!(store.count_records().unwrap(), 0);
    }

    #[test]
    fn most_recent_picks_latest_timestamp() {
        let (_dir, mut store) = setup_store();
        let mut first = store.create_new().unwrap();
        let mut second = store.create_new().unwrap();
        second.set_last_played("2001-01-01T00:00:00.000Z");
        write_record(&store.path_for(second.name()).unwrap(), &second).unwrap();
        store.update(&mut first).unwrap();

        assert_eq!(store.most_recent().unwrap().unwrap().name(), "Save-1");
    }

    #[test]
    fn developer_save_is_created_once_at_max_level() {
        let (_dir, mut store) = setup_store();
        let factions = FactionCatalog::from_entries(default_factions());

        let dev = store.developer_save(&factions).unwrap();
        assert_eq!(dev.name(), DEV_SAVE_NAME);
        for id in FactionId::ALL {
            assert_eq!(dev.progress(id).unwrap().level(), MAX_LEVEL);
        }

        // Lives in its own sub-store and is not counted as a normal save.
        assert_eq!(store.count_records().unwrap(), 0);

        let mut dev = dev;
        dev.progress_mut(FactionId::Dwarves).unlock_node("custom", 1);
        store.update(&mut dev).unwrap();
        let again = store.developer_save(&factions).unwrap();
        assert_eq!(again.progress(FactionId::Dwarves).unwrap().node_level("custom"), Some(1));
    }

    #[test]
    fn developer_save_cannot_be_deleted() {
        let (_dir, mut store) = setup_store();
        assert!(matches!(
            store.delete(DEV_SAVE_NAME),
            Err(SaveError::InvalidName(_))
        ));
    }
}
