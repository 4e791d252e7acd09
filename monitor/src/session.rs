//! A tracking session: one template, one state store, one saves directory.
//!
//! [`Tracker`] owns the aggregate and drives the [`Reconciler`]. Between
//! ticks it re-reads the persisted state so manual toggles written by
//! another process (the `override`/`custom` commands) show up on the next
//! tick.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{Reconciler, TickReport};
use crate::era::{Era, GameVersion};
use crate::error::Result;
use crate::model::{SectionCounts, SubGoalKind, TemplateData};
use crate::progress;
use crate::settings::{JsonStateStore, PersistedState, StateStore};
use crate::sources::{self, ActiveWorld, SnapshotReader};
use crate::template;
use crate::watcher::{FileWatcher, WatchEvent};

/// Game ticks per real-time second.
const TICKS_PER_SECOND: i64 = 20;

/// A live tracking session.
#[derive(Debug)]
pub struct Tracker<S: StateStore = JsonStateStore> {
    reconciler: Reconciler<S>,
    reader: SnapshotReader,
    template_path: PathBuf,
    lang_path: Option<PathBuf>,
    data: TemplateData,
    state: PersistedState,
    /// The in-memory state holds changes the store failed to persist.
    pending_save: bool,
}

impl Tracker<JsonStateStore> {
    /// Opens a session backed by the JSON state file from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the state file exists but cannot be read or parsed. A
    /// broken template is not an error: the empty template is used instead.
    pub fn open(config: &Config) -> Result<Self> {
        Self::with_store(config, JsonStateStore::new(&config.state_path))
    }

    /// Loads the configuration from the environment and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`](crate::MonitorError::Config) for a
    /// missing or invalid variable, otherwise the errors of [`Tracker::open`].
    pub fn from_env() -> Result<(Config, Self)> {
        let config = Config::from_env()?;
        let tracker = Self::open(&config)?;
        Ok((config, tracker))
    }
}

impl<S: StateStore> Tracker<S> {
    /// Opens a session backed by an arbitrary store.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be loaded.
    pub fn with_store(config: &Config, store: S) -> Result<Self> {
        let state = store.load()?;
        let data = template::load_or_default(&config.template_path, config.lang_path.as_deref());
        let reconciler = Reconciler::new(config.version.clone(), store);
        let reader = reconciler.reader(&config.saves_dir);

        info!(
            version = %config.version,
            era = %config.version.era(),
            template = %config.template_path.display(),
            "Tracker opened"
        );

        let mut tracker = Self {
            reconciler,
            reader,
            template_path: config.template_path.clone(),
            lang_path: config.lang_path.clone(),
            data,
            state,
            pending_save: false,
        };
        tracker.seed_data();
        Ok(tracker)
    }

    /// Copies persisted fields into a freshly loaded aggregate.
    fn seed_data(&mut self) {
        self.data.legacy = self.state.legacy_snapshot.clone();
        self.data.last_known_world_name = self.state.last_world_name.clone();
        let era = self.era();
        progress::recompute(&mut self.data, era);
    }

    /// Reads the snapshots and runs one reconciliation pass.
    ///
    /// The state is reloaded from the store first. After a failed save the
    /// save is retried instead, and while it keeps failing the in-memory
    /// state is used so a captured baseline or world change is not lost.
    pub fn tick(&mut self) -> TickReport {
        if self.pending_save {
            match self.reconciler.store().save(&self.state) {
                Ok(()) => {
                    info!("Persisted state after earlier failure");
                    self.pending_save = false;
                }
                Err(e) => warn!(error = %e, "State still unsaved, keeping in-memory state"),
            }
        }

        if !self.pending_save {
            match self.reconciler.store().load() {
                Ok(state) => self.state = state,
                Err(e) => warn!(error = %e, "Failed to reload state, using last known state"),
            }
        }

        let snapshots = self.reader.read();
        let report = self
            .reconciler
            .tick(&mut self.data, &snapshots, &mut self.state);
        self.pending_save |= report.state_unsaved;
        report
    }

    /// `true` while the in-memory state has changes the store rejected.
    #[must_use]
    pub fn has_unsaved_state(&self) -> bool {
        self.pending_save
    }

    /// Replaces the aggregate with a freshly loaded template.
    ///
    /// On failure the current template stays in place.
    ///
    /// # Errors
    ///
    /// Returns the template error when the new template cannot be loaded.
    pub fn switch_template(&mut self, path: &Path) -> Result<()> {
        let data = template::load_template(path, self.lang_path.as_deref())?;
        self.data = data;
        self.template_path = path.to_path_buf();
        self.seed_data();
        info!(template = %path.display(), "Switched template");
        Ok(())
    }

    #[must_use]
    pub fn data(&self) -> &TemplateData {
        &self.data
    }

    #[must_use]
    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    #[must_use]
    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    #[must_use]
    pub fn version(&self) -> &GameVersion {
        self.reconciler.version()
    }

    #[must_use]
    pub fn era(&self) -> Era {
        self.reconciler.era()
    }

    /// Directories whose changes should trigger a tick.
    #[must_use]
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.reader.saves_dir().to_path_buf()];
        if self.era() == Era::Legacy {
            let stats = self.reader.legacy_stats_dir();
            if stats.is_dir() {
                dirs.push(stats);
            }
        }
        dirs
    }

    /// Starts a file watcher over the watch directories that exist.
    ///
    /// Returns `Ok(None)` when none of them exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Watch`](crate::MonitorError::Watch) when the
    /// platform watcher cannot be started.
    pub fn watcher(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Option<FileWatcher>> {
        let dirs: Vec<PathBuf> = self
            .watch_dirs()
            .into_iter()
            .filter(|dir| dir.is_dir())
            .collect();
        if dirs.is_empty() {
            return Ok(None);
        }
        Ok(Some(FileWatcher::new(dirs, tx)?))
    }

    /// The world the next tick will read, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Snapshot`](crate::MonitorError::Snapshot) when
    /// the saves directory exists but cannot be listed.
    pub fn active_world(&self) -> Result<Option<ActiveWorld>> {
        Ok(sources::find_active_world(self.reader.saves_dir())?)
    }

    /// Plain-text report of the current state.
    #[must_use]
    pub fn summary(&self) -> String {
        let data = &self.data;
        let mut out = String::new();

        let world = data.last_known_world_name.as_deref().unwrap_or("(no world)");
        let _ = writeln!(out, "Waypost {} ({}) - {}", self.version(), self.era(), world);
        let _ = writeln!(
            out,
            "Overall: {:.2}% ({}/{} steps)",
            data.overall_progress_percentage,
            data.completed_progress_steps,
            data.total_progress_steps
        );

        let counts = &data.counts;
        let section = |out: &mut String, name: &str, c: &SectionCounts| {
            if c.total > 0 {
                let _ = writeln!(out, "  {name:<13} {}/{}", c.completed, c.total);
            }
        };
        section(&mut out, "Advancements", &counts.advancements);
        if counts.total_criteria_count > 0 {
            let _ = writeln!(
                out,
                "  {:<13} {}/{}",
                "Criteria", counts.completed_criteria_count, counts.total_criteria_count
            );
        }
        section(&mut out, "Recipes", &counts.recipes);
        section(&mut out, "Stats", &counts.stats);
        section(&mut out, "Unlocks", &counts.unlocks);
        section(&mut out, "Custom", &counts.custom);
        section(&mut out, "Multi-stage", &counts.multi_stage);

        for goal in data.multi_stage_goals.iter().filter(|g| !g.is_hidden) {
            let Some(stage) = goal.active_stage() else {
                continue;
            };
            let detail = match &stage.kind {
                SubGoalKind::Stat {
                    required_progress,
                    current_stat_progress,
                    ..
                } => format!(" ({current_stat_progress}/{required_progress})"),
                _ => String::new(),
            };
            let _ = writeln!(
                out,
                "  > {} [{}/{}]: {}{}",
                goal.display_name,
                goal.current_stage,
                goal.step_count(),
                stage.display_text,
                detail
            );
        }

        let seconds = data.play_time_ticks / TICKS_PER_SECOND;
        let _ = writeln!(
            out,
            "Play time: {}h {:02}m",
            seconds / 3600,
            (seconds % 3600) / 60
        );
        out
    }
}
