//! Locating and reading the game's progress files for one tick.
//!
//! The game and the monitor write and read the same files without any
//! coordination, so each source is read independently and a failure only
//! blanks that source for the current tick.
//!
//! # Layout
//!
//! ```text
//! <game dir>/
//! ├── stats/stats_<user>_unsent.dat     # legacy: lifetime counters, all worlds
//! └── saves/
//!     └── <world>/                      # most recently modified = active world
//!         ├── advancements/<uuid>.json  # hybrid, modern
//!         ├── stats/<uuid>.json         # mid, hybrid, modern
//!         └── unlocks/<uuid>.json       # any era that carries unlocks
//! ```

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::era::Era;
use crate::parser::{self, ParseError};

/// Directory of per-player advancement files inside a world.
pub const ADVANCEMENTS_DIR: &str = "advancements";

/// Directory of per-player stats files inside a world (and, for legacy, beside `saves/`).
pub const STATS_DIR: &str = "stats";

/// Directory of per-player unlock files inside a world.
pub const UNLOCKS_DIR: &str = "unlocks";

/// The three external progress sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Advancements,
    Stats,
    Unlocks,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Advancements => "advancements",
            SourceKind::Stats => "stats",
            SourceKind::Unlocks => "unlocks",
        })
    }
}

/// Errors that can occur while reading a snapshot source.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// A directory or file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was read but could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl SnapshotError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The world the player most recently played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWorld {
    /// Directory name, used as the world identity.
    pub name: String,
    pub path: PathBuf,
}

/// The documents read for one tick. `None` means the source was absent or
/// unreadable and its sub-update must be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshots {
    pub world_name: Option<String>,
    pub advancements: Option<Value>,
    pub stats: Option<Value>,
    pub unlocks: Option<Value>,
}

impl Snapshots {
    /// Document holding achievement/advancement progress for `era`.
    ///
    /// Legacy and mid-era achievements live in the statistics document.
    #[must_use]
    pub fn achievements(&self, era: Era) -> Option<&Value> {
        if era.achievements_in_stats() {
            self.stats.as_ref()
        } else {
            self.advancements.as_ref()
        }
    }

    /// Sources whose update pass cannot run for `era` this tick.
    ///
    /// An unknown era has no addressing for achievements or statistics, so
    /// both are always reported.
    #[must_use]
    pub fn missing(&self, era: Era) -> Vec<SourceKind> {
        let mut missing = Vec::new();
        if !era.is_known() || self.achievements(era).is_none() {
            missing.push(SourceKind::Advancements);
        }
        if !era.is_known() || self.stats.is_none() {
            missing.push(SourceKind::Stats);
        }
        if self.unlocks.is_none() {
            missing.push(SourceKind::Unlocks);
        }
        missing
    }
}

/// Finds the most recently modified world directory under `saves_dir`.
///
/// Ties on modification time are broken by name so the choice is stable.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] when `saves_dir` cannot be listed.
pub fn find_active_world(saves_dir: &Path) -> Result<Option<ActiveWorld>, SnapshotError> {
    let newest = newest_entry(saves_dir, |path| path.is_dir())?;
    Ok(newest.and_then(|path| {
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(ActiveWorld { name, path })
    }))
}

/// Finds the most recently modified file in `dir` with the given extension.
///
/// A missing directory yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] when `dir` exists but cannot be listed.
pub fn newest_file(dir: &Path, extension: &str) -> Result<Option<PathBuf>, SnapshotError> {
    newest_entry(dir, |path| {
        path.is_file() && path.extension().is_some_and(|ext| ext == extension)
    })
}

fn newest_entry(
    dir: &Path,
    accept: impl Fn(&Path) -> bool,
) -> Result<Option<PathBuf>, SnapshotError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SnapshotError::io(dir, e)),
    };

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| SnapshotError::io(dir, e))?;
        let path = entry.path();
        if !accept(&path) {
            continue;
        }
        // Entries can vanish between listing and stat.
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            trace!(path = %path.display(), "Skipping entry without modification time");
            continue;
        };
        let newer = match &best {
            None => true,
            Some((time, current)) => modified > *time || (modified == *time && path > *current),
        };
        if newer {
            best = Some((modified, path));
        }
    }

    Ok(best.map(|(_, path)| path))
}

/// Reads the three snapshot sources for an era from a saves directory.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    saves_dir: PathBuf,
    era: Era,
}

impl SnapshotReader {
    #[must_use]
    pub fn new(saves_dir: impl Into<PathBuf>, era: Era) -> Self {
        Self {
            saves_dir: saves_dir.into(),
            era,
        }
    }

    #[must_use]
    pub fn saves_dir(&self) -> &Path {
        &self.saves_dir
    }

    /// Legacy lifetime stats directory, a sibling of the saves directory.
    #[must_use]
    pub fn legacy_stats_dir(&self) -> PathBuf {
        self.saves_dir
            .parent()
            .map_or_else(|| PathBuf::from(STATS_DIR), |p| p.join(STATS_DIR))
    }

    /// Reads every source. Never fails: problems are logged and the
    /// affected source is left `None`.
    #[must_use]
    pub fn read(&self) -> Snapshots {
        let world = match find_active_world(&self.saves_dir) {
            Ok(Some(world)) => world,
            Ok(None) => {
                debug!(saves_dir = %self.saves_dir.display(), "No world found");
                return Snapshots::default();
            }
            Err(e) => {
                warn!(error = %e, "Failed to locate active world");
                return Snapshots::default();
            }
        };
        trace!(world = %world.name, era = %self.era, "Reading snapshots");

        let stats = match self.era {
            Era::Legacy => self.read_source(SourceKind::Stats, &self.legacy_stats_dir(), "dat"),
            Era::Mid | Era::Hybrid | Era::Modern => {
                self.read_source(SourceKind::Stats, &world.path.join(STATS_DIR), "json")
            }
            Era::Unknown => None,
        };

        let advancements = match self.era {
            Era::Hybrid | Era::Modern => self.read_source(
                SourceKind::Advancements,
                &world.path.join(ADVANCEMENTS_DIR),
                "json",
            ),
            Era::Legacy | Era::Mid | Era::Unknown => None,
        };

        let unlocks = self.read_source(SourceKind::Unlocks, &world.path.join(UNLOCKS_DIR), "json");

        Snapshots {
            world_name: Some(world.name),
            advancements,
            stats,
            unlocks,
        }
    }

    fn read_source(&self, kind: SourceKind, dir: &Path, extension: &str) -> Option<Value> {
        let path = match newest_file(dir, extension) {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!(source = %kind, dir = %dir.display(), "Source not present");
                return None;
            }
            Err(e) => {
                warn!(source = %kind, error = %e, "Failed to list source directory");
                return None;
            }
        };

        match read_document(&path, self.era == Era::Legacy && kind == SourceKind::Stats) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(source = %kind, error = %e, "Skipping unreadable source this tick");
                None
            }
        }
    }
}

/// Reads and parses one snapshot file.
///
/// # Errors
///
/// Returns a [`SnapshotError`] when the file cannot be read or parsed.
pub fn read_document(path: &Path, legacy_stats: bool) -> Result<Value, SnapshotError> {
    let content = fs::read_to_string(path).map_err(|e| SnapshotError::io(path, e))?;
    let parsed = if legacy_stats {
        parser::parse_legacy_stats(&content)
    } else {
        parser::parse_document(&content)
    };
    parsed.map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
