//! Achievement and advancement state.
//!
//! # Source Formats
//!
//! Legacy (stats document, achievements are numeric stat IDs):
//!
//! ```json
//! { "5242880": 1, "5242881": 3 }
//! ```
//!
//! Mid (stats document, `achievement.*` keys, either a count or an object
//! listing earned criteria):
//!
//! ```json
//! { "achievement.openInventory": 1,
//!   "achievement.exploreAllBiomes": { "value": 0, "progress": ["Desert", "Forest"] } }
//! ```
//!
//! Hybrid and Modern (advancements document):
//!
//! ```json
//! { "minecraft:story/mine_stone": {
//!     "criteria": { "get_stone": "2026-01-15 10:00:00 +0000" },
//!     "done": true } }
//! ```

use serde_json::Value;

use crate::era::Era;
use crate::model::{LegacySnapshot, TrackableCategory};
use crate::parser::{as_counter, is_truthy};

/// Key of the earned-criteria list on a mid-era achievement object.
const MID_PROGRESS_KEY: &str = "progress";

/// Key of the count on a mid-era achievement object.
const MID_VALUE_KEY: &str = "value";

/// Key of the game-reported completion flag on an advancement entry.
const DONE_KEY: &str = "done";

/// Key of the criteria map on an advancement entry.
const CRITERIA_KEY: &str = "criteria";

/// Game-reported completion flag for an achievement or advancement.
///
/// Legacy achievements are one-shot flags: any count of 1 or more means
/// earned, independent of the baseline.
#[must_use]
pub fn entry_done(era: Era, doc: &Value, root_name: &str) -> bool {
    let Some(entry) = doc.get(root_name) else {
        return false;
    };
    match era {
        Era::Legacy => as_counter(entry).is_some_and(|n| n >= 1),
        Era::Mid => match entry {
            Value::Object(obj) => obj
                .get(MID_VALUE_KEY)
                .and_then(as_counter)
                .is_some_and(|n| n >= 1),
            other => as_counter(other).is_some_and(|n| n >= 1),
        },
        Era::Hybrid | Era::Modern => entry.get(DONE_KEY).is_some_and(is_truthy),
        Era::Unknown => false,
    }
}

/// Whether the game lists `criterion` as earned under `parent`.
///
/// Legacy achievements have no criteria, so this is always `false` there.
#[must_use]
pub fn criterion_present(era: Era, doc: &Value, parent: &str, criterion: &str) -> bool {
    let Some(entry) = doc.get(parent) else {
        return false;
    };
    match era {
        Era::Mid => entry
            .get(MID_PROGRESS_KEY)
            .and_then(Value::as_array)
            .is_some_and(|earned| earned.iter().any(|c| c.as_str() == Some(criterion))),
        Era::Hybrid | Era::Modern => entry
            .get(CRITERIA_KEY)
            .and_then(Value::as_object)
            .is_some_and(|criteria| criteria.contains_key(criterion)),
        Era::Legacy | Era::Unknown => false,
    }
}

/// Recomputes every advancement from the achievements document.
///
/// A category is done when the game says so or when every criterion the
/// template declares has been earned.
pub fn update_advancements(
    advancements: &mut [TrackableCategory],
    era: Era,
    doc: &Value,
    legacy: &LegacySnapshot,
) {
    for category in advancements.iter_mut() {
        let game_done = entry_done(era, doc, &category.root_name);

        for criterion in &mut category.criteria {
            let earned = match era {
                // Legacy criteria only exist as template decoration.
                Era::Legacy => game_done,
                _ => criterion_present(era, doc, &category.root_name, &criterion.root_name),
            };
            criterion.done = earned;
            criterion.progress = i64::from(earned);
            criterion.is_manually_completed = false;
        }

        category.recount();
        category.all_template_criteria_met = if category.criteria.is_empty() {
            game_done
        } else {
            category.completed_criteria_count == category.criteria_count()
        };
        category.done = game_done || category.all_template_criteria_met;
        category.is_manually_completed = false;
        category.done_in_snapshot =
            era == Era::Legacy && legacy.was_earned_before(&category.root_name);
    }
}
