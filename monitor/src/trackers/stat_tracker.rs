//! Statistic state, including manual override merging.
//!
//! # Addressing
//!
//! | Era | Document | Lookup |
//! |-----|----------|--------|
//! | Legacy | `{"2000": 12}` (lifetime) | flat key, minus the baseline |
//! | Mid, Hybrid | `{"stat.jump": 12}` | flat key |
//! | Modern | `{"stats": {"minecraft:custom": {"minecraft:jump": 12}}}` | `category/item` |
//!
//! # Overrides
//!
//! A criterion is done when its progress reaches the goal, when its own
//! override is set, or when its category's override is set. Criterion
//! overrides live under `<category>.criteria.<criterion>`, except in a
//! category with a single criterion, which shares the category key.

use serde_json::Value;

use crate::era::{Era, GameVersion};
use crate::model::{LegacySnapshot, StatKey, TrackableCategory};
use crate::parser::as_counter;
use crate::settings::{criterion_override_key, PersistedState};

/// Top-level key of the modern statistics document.
const MODERN_STATS_KEY: &str = "stats";

/// Raw counter value for a statistic address, if the document has it.
#[must_use]
pub fn raw_stat(era: Era, doc: &Value, key: &StatKey) -> Option<i64> {
    match era {
        Era::Legacy | Era::Mid | Era::Hybrid => doc.get(key.raw()).and_then(as_counter),
        Era::Modern => {
            let path = key.path()?;
            doc.get(MODERN_STATS_KEY)?
                .get(&path.category)?
                .get(&path.item)
                .and_then(as_counter)
        }
        Era::Unknown => None,
    }
}

/// Per-world progress for a statistic address.
///
/// Legacy counters are lifetime totals, so the captured baseline is
/// subtracted and the result clamped at zero. An absent counter is zero.
#[must_use]
pub fn stat_progress(era: Era, doc: &Value, key: &StatKey, legacy: &LegacySnapshot) -> i64 {
    let raw = raw_stat(era, doc, key).unwrap_or(0);
    match era {
        Era::Legacy => raw.saturating_sub(legacy.baseline(key.raw())).max(0),
        _ => raw,
    }
}

/// Ticks played in the current world.
#[must_use]
pub fn play_time(version: &GameVersion, doc: &Value, legacy: &LegacySnapshot) -> i64 {
    let era = version.era();
    let key = StatKey::parse(version.playtime_key());
    let raw = raw_stat(era, doc, &key).unwrap_or(0);
    match era {
        Era::Legacy => raw.saturating_sub(legacy.playtime).max(0),
        _ => raw,
    }
}

/// Recomputes every statistic category and merges manual overrides.
pub fn update_stats(
    stats: &mut [TrackableCategory],
    era: Era,
    doc: &Value,
    legacy: &LegacySnapshot,
    state: &PersistedState,
) {
    for category in stats.iter_mut() {
        let category_override = state.override_for(&category.root_name);
        let shares_category_key = category.criteria.len() == 1;

        for criterion in &mut category.criteria {
            criterion.progress = criterion
                .stat_key
                .as_ref()
                .map_or(0, |key| stat_progress(era, doc, key, legacy));

            let own_override = if shares_category_key {
                category_override
            } else {
                state.override_for(&criterion_override_key(
                    &category.root_name,
                    &criterion.root_name,
                ))
            };

            criterion.is_manually_completed = own_override || category_override;
            criterion.done = criterion.naturally_done() || criterion.is_manually_completed;
        }

        category.recount();
        category.all_template_criteria_met = !category.criteria.is_empty()
            && category.completed_criteria_count == category.criteria_count();
        category.is_manually_completed = category_override;
        category.done = category.all_template_criteria_met || category_override;
    }
}
