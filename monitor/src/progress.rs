//! Section counters and the weighted overall percentage.
//!
//! Every step weighs the same:
//!
//! | Entry | Steps | Completed |
//! |-------|-------|-----------|
//! | advancement | `max(1, criteria)` | all if done, else completed criteria |
//! | recipe | 1 | 1 if done |
//! | stat category | criteria | completed criteria |
//! | legacy hidden helper stat | excluded | excluded |
//! | unlock, custom goal | 1 | 1 if done |
//! | multi-stage goal | `stages - 1` | `current_stage` |
//!
//! A template with nothing to count is 100% complete.

use crate::era::Era;
use crate::model::{ProgressCounts, TemplateData, TrackableCategory, GOAL_TOGGLE};

/// Result of the overall calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallProgress {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub percentage: f64,
}

impl OverallProgress {
    fn from_steps(total_steps: usize, completed_steps: usize) -> Self {
        let percentage = if total_steps == 0 {
            100.0
        } else {
            100.0 * completed_steps as f64 / total_steps as f64
        };
        Self {
            total_steps,
            completed_steps,
            percentage,
        }
    }
}

/// A single-criterion toggle stat that only exists to feed multi-stage goals.
///
/// Only legacy templates declare these.
#[must_use]
pub fn is_hidden_helper(category: &TrackableCategory, era: Era) -> bool {
    era == Era::Legacy
        && category.is_single_stat_category
        && category.criteria.len() == 1
        && category.criteria[0].goal == GOAL_TOGGLE
}

fn advancement_steps(advancement: &TrackableCategory) -> (usize, usize) {
    if advancement.is_recipe {
        return (1, usize::from(advancement.done));
    }
    let total = advancement.criteria_count().max(1);
    let completed = if advancement.done {
        total
    } else {
        advancement.completed_criteria_count.min(total)
    };
    (total, completed)
}

/// Computes the overall percentage over a fully reconciled aggregate.
#[must_use]
pub fn overall_progress(data: &TemplateData, era: Era) -> OverallProgress {
    let mut total = 0;
    let mut completed = 0;

    for advancement in &data.advancements {
        let (t, c) = advancement_steps(advancement);
        total += t;
        completed += c;
    }

    for category in data.stats.iter().filter(|s| !is_hidden_helper(s, era)) {
        total += category.criteria_count();
        completed += category.completed_criteria_count.min(category.criteria_count());
    }

    for item in data.unlocks.iter().chain(&data.custom_goals) {
        total += 1;
        completed += usize::from(item.done);
    }

    for goal in &data.multi_stage_goals {
        total += goal.step_count();
        completed += goal.current_stage.min(goal.step_count());
    }

    OverallProgress::from_steps(total, completed)
}

/// Recomputes the per-section counters.
#[must_use]
pub fn compute_counts(data: &TemplateData, era: Era) -> ProgressCounts {
    let mut counts = ProgressCounts::default();

    for advancement in &data.advancements {
        if advancement.is_recipe {
            counts.recipes.record(advancement.done, advancement.is_hidden);
        } else {
            counts
                .advancements
                .record(advancement.done, advancement.is_hidden);
            counts.total_criteria_count += advancement.criteria_count();
            counts.completed_criteria_count += advancement.completed_criteria_count;
        }
    }

    for category in data.stats.iter().filter(|s| !is_hidden_helper(s, era)) {
        counts.stats.record(category.done, category.is_hidden);
    }

    for unlock in &data.unlocks {
        counts.unlocks.record(unlock.done, unlock.is_hidden);
    }

    for goal in &data.custom_goals {
        counts.custom.record(goal.done, goal.is_hidden);
    }

    for goal in &data.multi_stage_goals {
        counts.multi_stage.record(goal.is_complete(), goal.is_hidden);
    }

    counts
}

/// Refreshes counters and the overall percentage on the aggregate.
pub fn recompute(data: &mut TemplateData, era: Era) {
    data.counts = compute_counts(data, era);
    let overall = overall_progress(data, era);
    data.total_progress_steps = overall.total_steps;
    data.completed_progress_steps = overall.completed_steps;
    data.overall_progress_percentage = overall.percentage;
}
