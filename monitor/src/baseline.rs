//! Legacy baseline capture.
//!
//! Legacy statistics are lifetime totals shared by every world, so when the
//! player enters a world the tracker has no baseline for, the current
//! counters are recorded and all later progress is measured from them.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::era::{Era, GameVersion};
use crate::model::{LegacySnapshot, StatKey, TemplateData};
use crate::parser::as_counter;
use crate::trackers::{advancement_tracker, stat_tracker};

/// Whether `world` needs a fresh baseline.
///
/// True when no baseline was ever captured or it belongs to another world.
#[must_use]
pub fn needs_baseline(snapshot: &LegacySnapshot, world: &str) -> bool {
    snapshot.world_name.as_deref() != Some(world)
}

/// Records the current legacy counters as the baseline for `world`.
///
/// Every counter in the document is recorded, not only those the current
/// template uses, so switching templates later keeps valid baselines.
#[must_use]
pub fn capture(
    data: &TemplateData,
    world: &str,
    stats: &Value,
    version: &GameVersion,
    captured_at: DateTime<Utc>,
) -> LegacySnapshot {
    let initial_progress = stats
        .as_object()
        .map(|counters| {
            counters
                .iter()
                .filter_map(|(id, value)| as_counter(value).map(|n| (id.clone(), n)))
                .collect()
        })
        .unwrap_or_default();

    let earned_before = data
        .advancements
        .iter()
        .filter(|a| advancement_tracker::entry_done(Era::Legacy, stats, &a.root_name))
        .map(|a| (a.root_name.clone(), true))
        .collect();

    let playtime_key = StatKey::parse(version.playtime_key());
    let playtime = stat_tracker::raw_stat(Era::Legacy, stats, &playtime_key).unwrap_or(0);

    LegacySnapshot {
        world_name: Some(world.to_string()),
        playtime,
        captured_at: Some(captured_at),
        initial_progress,
        earned_before,
    }
}
