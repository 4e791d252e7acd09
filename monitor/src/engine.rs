//! The per-tick reconciliation pass.
//!
//! One call to [`Reconciler::tick`] brings a [`TemplateData`] up to date with
//! the snapshots read for that tick:
//!
//! 1. detect a world change (reset manual progress, persist)
//! 2. capture a legacy baseline for a world that has none (persist)
//! 3. achievements/advancements, then statistics (era-specific)
//! 4. unlocks, custom goals, multi-stage goals
//! 5. counters and the overall percentage
//!
//! A source that is `None` skips its pass and leaves the previous state in
//! place. An unknown era skips every era-specific pass.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::baseline;
use crate::era::{Era, GameVersion};
use crate::model::TemplateData;
use crate::progress;
use crate::settings::{PersistedState, StateStore};
use crate::sources::{SnapshotReader, Snapshots, SourceKind};
use crate::trackers::{
    advancement_tracker, custom_tracker, stage_tracker, stat_tracker, unlock_tracker,
    StageContext,
};

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub era: Era,
    pub world: Option<String>,
    /// The active world differs from the one seen on the previous tick.
    pub world_changed: bool,
    pub baseline_captured: bool,
    /// State changed this tick but could not be persisted.
    pub state_unsaved: bool,
    /// Passes skipped because their source was absent or the era is unknown.
    pub skipped: Vec<SourceKind>,
    pub percentage: f64,
}

/// Runs reconciliation passes for one game version against one state store.
#[derive(Debug)]
pub struct Reconciler<S: StateStore> {
    version: GameVersion,
    store: S,
}

impl<S: StateStore> Reconciler<S> {
    pub fn new(version: GameVersion, store: S) -> Self {
        Self { version, store }
    }

    #[must_use]
    pub fn era(&self) -> Era {
        self.version.era()
    }

    #[must_use]
    pub fn version(&self) -> &GameVersion {
        &self.version
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// A reader for this version's sources under `saves_dir`.
    #[must_use]
    pub fn reader(&self, saves_dir: impl Into<std::path::PathBuf>) -> SnapshotReader {
        SnapshotReader::new(saves_dir, self.era())
    }

    /// Runs one full pass. Never fails: skipped work is reported instead.
    pub fn tick(
        &self,
        data: &mut TemplateData,
        snapshots: &Snapshots,
        state: &mut PersistedState,
    ) -> TickReport {
        let era = self.era();
        let mut report = TickReport {
            era,
            world: snapshots.world_name.clone(),
            world_changed: false,
            baseline_captured: false,
            state_unsaved: false,
            skipped: Vec::new(),
            percentage: data.overall_progress_percentage,
        };
        let mut dirty = false;

        if let Some(world) = snapshots.world_name.as_deref() {
            if data.last_known_world_name.as_deref() != Some(world) {
                if let Some(previous) = data.last_known_world_name.as_deref() {
                    info!(from = %previous, to = %world, "World changed, resetting manual progress");
                    state.reset_world_progress();
                    report.world_changed = true;
                } else {
                    info!(world = %world, "Tracking world");
                }
                data.last_known_world_name = Some(world.to_string());
                state.last_world_name = Some(world.to_string());
                dirty = true;
            }

            if era == Era::Legacy && baseline::needs_baseline(&state.legacy_snapshot, world) {
                match snapshots.stats.as_ref() {
                    Some(stats) => {
                        state.legacy_snapshot =
                            baseline::capture(data, world, stats, &self.version, Utc::now());
                        // Manual progress never carries into a freshly baselined world.
                        state.reset_world_progress();
                        report.baseline_captured = true;
                        dirty = true;
                        info!(
                            world = %world,
                            counters = state.legacy_snapshot.initial_progress.len(),
                            playtime = state.legacy_snapshot.playtime,
                            "Captured legacy baseline"
                        );
                    }
                    None => {
                        warn!(world = %world, "Legacy stats unavailable, baseline capture deferred");
                    }
                }
            }
        }

        if data.legacy != state.legacy_snapshot {
            data.legacy.clone_from(&state.legacy_snapshot);
        }

        if dirty {
            if let Err(e) = self.store.save(state) {
                error!(error = %e, "Failed to persist state");
                report.state_unsaved = true;
            }
        }

        self.update_sources(data, snapshots, state, &mut report);

        custom_tracker::update_custom_goals(&mut data.custom_goals, state);

        let ctx = StageContext {
            era,
            advancements: &data.advancements,
            snapshots,
            legacy: &data.legacy,
        };
        stage_tracker::evaluate_goals(&mut data.multi_stage_goals, &ctx);

        progress::recompute(data, era);
        report.percentage = data.overall_progress_percentage;

        debug!(
            era = %era,
            completed = data.completed_progress_steps,
            total = data.total_progress_steps,
            percentage = data.overall_progress_percentage,
            "Tick complete"
        );
        report
    }

    fn update_sources(
        &self,
        data: &mut TemplateData,
        snapshots: &Snapshots,
        state: &PersistedState,
        report: &mut TickReport,
    ) {
        let era = self.era();
        report.skipped = snapshots.missing(era);
        if !report.skipped.is_empty() {
            debug!(era = %era, skipped = ?report.skipped, "Skipping passes this tick");
        }

        if era.is_known() {
            if let Some(doc) = snapshots.achievements(era) {
                advancement_tracker::update_advancements(
                    &mut data.advancements,
                    era,
                    doc,
                    &data.legacy,
                );
            }

            if let Some(doc) = snapshots.stats.as_ref() {
                stat_tracker::update_stats(&mut data.stats, era, doc, &data.legacy, state);
                data.play_time_ticks = stat_tracker::play_time(&self.version, doc, &data.legacy);
            }
        } else {
            debug!(version = %self.version, "Unknown era, skipping era-specific updates");
        }

        if let Some(doc) = snapshots.unlocks.as_ref() {
            unlock_tracker::update_unlocks(&mut data.unlocks, doc);
        }
    }
}
