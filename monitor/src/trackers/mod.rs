//! Per-source update passes run by the reconciler.
//!
//! - [`advancement_tracker`]: achievements and advancements, dispatched by era
//! - [`stat_tracker`]: statistics, legacy baselines and manual overrides
//! - [`unlock_tracker`]: obtained unlocks
//! - [`custom_tracker`]: custom goals from persisted manual progress
//! - [`stage_tracker`]: multi-stage goals, evaluated last
//!
//! Each pass only runs when its source was read this tick, and cannot fail
//! once started, so a pass is either applied in full or not at all.

pub mod advancement_tracker;
pub mod custom_tracker;
pub mod stage_tracker;
pub mod stat_tracker;
pub mod unlock_tracker;

pub use stage_tracker::StageContext;
