//! Custom goals, driven entirely by persisted manual progress.
//!
//! | goal | stored | result |
//! |------|--------|--------|
//! | `0` | `true`/`false` | done = stored flag |
//! | `>0` | integer | done = progress >= goal |
//! | `-1` | `true` | forced: done, progress 1 |
//! | `-1` | integer | progress = value, never done |

use crate::model::{TrackableItem, GOAL_TOGGLE, GOAL_UNBOUNDED};
use crate::settings::{CustomValue, PersistedState};

/// Applies one stored value to a custom goal.
pub fn apply_custom_value(goal: &mut TrackableItem, value: Option<CustomValue>) {
    let (progress, done, forced) = match (goal.goal, value) {
        (_, None) => (0, false, false),

        (GOAL_TOGGLE, Some(CustomValue::Flag(flag))) => (i64::from(flag), flag, false),
        (GOAL_TOGGLE, Some(CustomValue::Count(n))) => (i64::from(n > 0), n > 0, false),

        (GOAL_UNBOUNDED, Some(CustomValue::Flag(true))) => (1, true, true),
        (GOAL_UNBOUNDED, Some(CustomValue::Flag(false))) => (0, false, false),
        (GOAL_UNBOUNDED, Some(CustomValue::Count(n))) => (n, false, false),

        (target, Some(CustomValue::Count(n))) => (n, n >= target, false),
        (target, Some(CustomValue::Flag(true))) => (target, true, true),
        (_, Some(CustomValue::Flag(false))) => (0, false, false),
    };

    goal.progress = progress;
    goal.done = done;
    goal.is_manually_completed = forced;
}

pub fn update_custom_goals(goals: &mut [TrackableItem], state: &PersistedState) {
    for goal in goals.iter_mut() {
        let value = state.custom_value(&goal.root_name);
        apply_custom_value(goal, value);
    }
}
