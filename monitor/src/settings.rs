//! Persisted engine state: manual overrides, custom-goal progress and the
//! legacy baseline.
//!
//! The reconciler reads this state every tick and writes it back on world
//! change. The UI layer (here, the CLI) writes it on manual toggles.
//!
//! # File Format
//!
//! ```json
//! {
//!   "stat_overrides": { "mine_stone": true, "travel.criteria.walk": true },
//!   "custom_progress": { "beat_dragon": true, "deaths": 7 },
//!   "legacy_snapshot": {
//!     "world_name": "New World",
//!     "playtime": 7200,
//!     "captured_at": "2026-01-15T10:00:00Z",
//!     "initial_progress": { "2000": 5 },
//!     "earned_before": { "5242880": true }
//!   },
//!   "last_world_name": "New World"
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use waypost_monitor::settings::{CustomValue, PersistedState};
//!
//! let mut state = PersistedState::default();
//! state.set_override("travel.criteria.walk", true);
//! state.set_custom_progress("deaths", CustomValue::Count(3));
//!
//! assert!(state.override_for("travel.criteria.walk"));
//! assert_eq!(state.custom_value("deaths"), Some(CustomValue::Count(3)));
//!
//! state.reset_world_progress();
//! assert!(!state.override_for("travel.criteria.walk"));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::LegacySnapshot;

/// Errors that can occur when reading or writing persisted state.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The state file exists but could not be read or written.
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file is not valid JSON for the expected shape.
    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the state failed.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A custom-goal value given on the command line is neither a boolean nor an integer.
    #[error("invalid custom progress value '{0}': expected true, false or an integer")]
    InvalidCustomValue(String),
}

/// Persisted value of a custom goal.
///
/// Toggles store a boolean, bounded counters an integer, and unbounded
/// counters either (`true` forces completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValue {
    Flag(bool),
    Count(i64),
}

impl FromStr for CustomValue {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(CustomValue::Flag(true)),
            "false" => Ok(CustomValue::Flag(false)),
            other => other
                .parse::<i64>()
                .map(CustomValue::Count)
                .map_err(|_| SettingsError::InvalidCustomValue(s.to_string())),
        }
    }
}

impl fmt::Display for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomValue::Flag(flag) => write!(f, "{flag}"),
            CustomValue::Count(count) => write!(f, "{count}"),
        }
    }
}

/// Override key of a criterion nested in a statistic category.
#[must_use]
pub fn criterion_override_key(category: &str, criterion: &str) -> String {
    format!("{category}.criteria.{criterion}")
}

/// Everything the engine persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Category key or `<category>.criteria.<criterion>` to forced completion.
    pub stat_overrides: BTreeMap<String, bool>,
    pub custom_progress: BTreeMap<String, CustomValue>,
    pub legacy_snapshot: LegacySnapshot,
    pub last_world_name: Option<String>,
}

impl PersistedState {
    /// Returns `true` when the override for `key` is set.
    #[must_use]
    pub fn override_for(&self, key: &str) -> bool {
        self.stat_overrides.get(key).copied().unwrap_or(false)
    }

    pub fn set_override(&mut self, key: impl Into<String>, value: bool) {
        self.stat_overrides.insert(key.into(), value);
    }

    /// Removes an override; returns whether one was present.
    pub fn clear_override(&mut self, key: &str) -> bool {
        self.stat_overrides.remove(key).is_some()
    }

    #[must_use]
    pub fn custom_value(&self, key: &str) -> Option<CustomValue> {
        self.custom_progress.get(key).copied()
    }

    pub fn set_custom_progress(&mut self, key: impl Into<String>, value: CustomValue) {
        self.custom_progress.insert(key.into(), value);
    }

    /// Drops all per-world manual state: overrides and custom-goal progress.
    pub fn reset_world_progress(&mut self) {
        self.stat_overrides.clear();
        self.custom_progress.clear();
    }
}

/// Durable storage for [`PersistedState`].
pub trait StateStore {
    /// Loads the state. A store that has never been written yields the default state.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when existing state cannot be read or parsed.
    fn load(&self) -> Result<PersistedState, SettingsError>;

    /// Writes the state.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the state cannot be written.
    fn save(&self, state: &PersistedState) -> Result<(), SettingsError>;
}

/// JSON file store.
///
/// Writes land in a sibling temporary file that is renamed over the target,
/// so readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<PersistedState, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, using defaults");
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if contents.trim().is_empty() {
            return Ok(PersistedState::default());
        }

        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &PersistedState) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, json.as_bytes()).map_err(|e| self.io_error(e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}

/// In-memory store, used when no durable location is wanted.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RefCell<PersistedState>,
    saves: Cell<usize>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new(state: PersistedState) -> Self {
        Self {
            state: RefCell::new(state),
            saves: Cell::new(0),
        }
    }

    /// Number of times [`StateStore::save`] has been called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// A copy of the last saved state.
    #[must_use]
    pub fn snapshot(&self) -> PersistedState {
        self.state.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<PersistedState, SettingsError> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), SettingsError> {
        *self.state.borrow_mut() = state.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonStateStore {
        JsonStateStore::new(dir.path().join("nested").join("state.json"))
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = store_in(&dir).load().unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn empty_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "  \n").unwrap();
        let state = JsonStateStore::new(path).load().unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonStateStore::new(path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse state file"));
    }

    #[test]
    fn save_then_load_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut state = PersistedState::default();
        state.set_override("mine_stone", true);
        state.set_custom_progress("beat_dragon", CustomValue::Flag(true));
        state.set_custom_progress("deaths", CustomValue::Count(7));
        state.legacy_snapshot.world_name = Some("World".to_string());
        state.legacy_snapshot.initial_progress.insert("2000".to_string(), 5);
        state.last_world_name = Some("World".to_string());

        store.save(&state).unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn custom_values_keep_their_json_shape() {
        let mut state = PersistedState::default();
        state.set_custom_progress("flag", CustomValue::Flag(true));
        state.set_custom_progress("count", CustomValue::Count(7));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["custom_progress"]["flag"], serde_json::json!(true));
        assert_eq!(json["custom_progress"]["count"], serde_json::json!(7));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let state: PersistedState =
            serde_json::from_str(r#"{"stat_overrides": {"a": true}}"#).unwrap();
        assert!(state.override_for("a"));
        assert!(state.custom_progress.is_empty());
        assert_eq!(state.legacy_snapshot, LegacySnapshot::default());
    }

    #[test]
    fn custom_value_from_str() {
        assert_eq!("true".parse::<CustomValue>().unwrap(), CustomValue::Flag(true));
        assert_eq!("false".parse::<CustomValue>().unwrap(), CustomValue::Flag(false));
        assert_eq!("-1".parse::<CustomValue>().unwrap(), CustomValue::Count(-1));
        assert_eq!(" 12 ".parse::<CustomValue>().unwrap(), CustomValue::Count(12));
        assert!(matches!(
            "yes".parse::<CustomValue>(),
            Err(SettingsError::InvalidCustomValue(_))
        ));
    }

    #[test]
    fn override_lifecycle() {
        let mut state = PersistedState::default();
        let key = criterion_override_key("travel", "walk");
        assert_eq!(key, "travel.criteria.walk");
        assert!(!state.override_for(&key));
        state.set_override(key.clone(), true);
        assert!(state.override_for(&key));
        assert!(state.clear_override(&key));
        assert!(!state.clear_override(&key));
    }

    #[test]
    fn reset_world_progress_keeps_baseline() {
        let mut state = PersistedState::default();
        state.set_override("a", true);
        state.set_custom_progress("b", CustomValue::Count(2));
        state.legacy_snapshot.playtime = 40;
        state.reset_world_progress();
        assert!(state.stat_overrides.is_empty());
        assert!(state.custom_progress.is_empty());
        assert_eq!(state.legacy_snapshot.playtime, 40);
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStateStore::default();
        let mut state = store.load().unwrap();
        state.set_override("x", true);
        store.save(&state).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot().override_for("x"));
    }
}
