//! Completion-state data model.
//!
//! The template loader builds a [`TemplateData`] once; after that only the
//! reconciler mutates its progress-valued fields. Nothing here has behavior
//! beyond small derived predicates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Goal value of a simple toggle.
pub const GOAL_TOGGLE: i64 = 0;

/// Goal value of an unbounded counter that can only be force-completed.
pub const GOAL_UNBOUNDED: i64 = -1;

/// Separator between the category and item halves of a namespaced stat address.
pub const STAT_PATH_SEPARATOR: char = '/';

/// Two-level address of a modern statistic (`stats.<category>.<item>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatPath {
    /// Category, e.g. `minecraft:mined`.
    pub category: String,
    /// Item within the category, e.g. `minecraft:stone`.
    pub item: String,
}

/// A statistic address, split once at template-load time.
///
/// Legacy and mid-era lookups use [`raw`](Self::raw) as a flat key; modern
/// lookups use [`path`](Self::path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatKey {
    raw: String,
    path: Option<StatPath>,
}

impl StatKey {
    /// Parses an address such as `minecraft:mined/minecraft:stone` or `stat.jump`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let path = raw
            .split_once(STAT_PATH_SEPARATOR)
            .filter(|(category, item)| !category.is_empty() && !item.is_empty())
            .map(|(category, item)| StatPath {
                category: category.to_string(),
                item: item.to_string(),
            });
        Self {
            raw: raw.to_string(),
            path,
        }
    }

    /// The address as written in the template.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `(category, item)` split, if the address is namespaced.
    #[must_use]
    pub fn path(&self) -> Option<&StatPath> {
        self.path.as_ref()
    }
}

/// A leaf goal: an advancement criterion, a statistic, an unlock or a custom goal.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableItem {
    /// Unique, stable key.
    pub root_name: String,
    pub display_name: String,
    /// `0` toggle, `>0` bounded counter target, `-1` unbounded counter.
    pub goal: i64,
    pub progress: i64,
    pub done: bool,
    /// Set iff an external override forced completion this tick.
    pub is_manually_completed: bool,
    pub is_hidden: bool,
    /// Statistic address; only present on statistic criteria.
    pub stat_key: Option<StatKey>,
}

impl TrackableItem {
    /// Creates a toggle item with no progress.
    #[must_use]
    pub fn new(root_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            display_name: display_name.into(),
            goal: GOAL_TOGGLE,
            progress: 0,
            done: false,
            is_manually_completed: false,
            is_hidden: false,
            stat_key: None,
        }
    }

    #[must_use]
    pub fn with_goal(mut self, goal: i64) -> Self {
        self.goal = goal;
        self
    }

    #[must_use]
    pub fn with_stat_key(mut self, key: StatKey) -> Self {
        self.stat_key = Some(key);
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.is_hidden = hidden;
        self
    }

    /// Returns `true` for a bounded counter (`goal > 0`).
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.goal > 0
    }

    /// Completion implied by progress alone, ignoring overrides.
    ///
    /// Toggles and unbounded counters never complete on their own.
    #[must_use]
    pub fn naturally_done(&self) -> bool {
        self.is_bounded() && self.progress >= self.goal
    }
}

/// A parent grouping of criteria: an advancement or a statistic category.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableCategory {
    pub root_name: String,
    pub display_name: String,
    pub criteria: Vec<TrackableItem>,
    /// Always equal to the number of `criteria` with `done` set.
    pub completed_criteria_count: usize,
    pub done: bool,
    /// Every template-declared criterion is done, independent of forced completion.
    pub all_template_criteria_met: bool,
    pub is_manually_completed: bool,
    /// Declared without a criteria block; holds exactly one synthesized criterion.
    pub is_single_stat_category: bool,
    pub is_recipe: bool,
    pub is_hidden: bool,
    /// Legacy only: already earned when the baseline was captured.
    pub done_in_snapshot: bool,
}

impl TrackableCategory {
    #[must_use]
    pub fn new(root_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            display_name: display_name.into(),
            criteria: Vec::new(),
            completed_criteria_count: 0,
            done: false,
            all_template_criteria_met: false,
            is_manually_completed: false,
            is_single_stat_category: false,
            is_recipe: false,
            is_hidden: false,
            done_in_snapshot: false,
        }
    }

    /// Builds a single-stat category whose one criterion inherits the category key and goal.
    #[must_use]
    pub fn single_stat(
        root_name: impl Into<String>,
        display_name: impl Into<String>,
        stat_key: StatKey,
        goal: i64,
    ) -> Self {
        let root_name = root_name.into();
        let display_name = display_name.into();
        let criterion = TrackableItem::new(root_name.clone(), display_name.clone())
            .with_goal(goal)
            .with_stat_key(stat_key);
        let mut category = Self::new(root_name, display_name);
        category.criteria.push(criterion);
        category.is_single_stat_category = true;
        category
    }

    #[must_use]
    pub fn criteria_count(&self) -> usize {
        self.criteria.len()
    }

    /// Looks up a criterion by key.
    #[must_use]
    pub fn criterion(&self, root_name: &str) -> Option<&TrackableItem> {
        self.criteria.iter().find(|c| c.root_name == root_name)
    }

    /// Recounts `completed_criteria_count` from the criteria's `done` flags.
    pub fn recount(&mut self) {
        self.completed_criteria_count = self.criteria.iter().filter(|c| c.done).count();
    }
}

/// Kind-specific payload of a multi-stage goal stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SubGoalKind {
    Advancement {
        root_name: String,
    },
    Stat {
        key: StatKey,
        required_progress: i64,
        /// Last observed value, for display only.
        current_stat_progress: i64,
    },
    Unlock {
        root_name: String,
    },
    Criterion {
        parent: String,
        criterion: String,
    },
    /// Terminal marker; never evaluated automatically.
    Manual,
}

/// One ordered stage of a [`MultiStageGoal`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubGoal {
    pub stage_id: String,
    pub display_text: String,
    pub kind: SubGoalKind,
}

impl SubGoal {
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self.kind, SubGoalKind::Manual)
    }
}

/// A goal whose stages must complete in strict order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStageGoal {
    pub root_name: String,
    pub display_name: String,
    pub stages: Vec<SubGoal>,
    /// Number of consecutive completed stages from the start.
    pub current_stage: usize,
    pub is_hidden: bool,
}

impl MultiStageGoal {
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Weight in the overall percentage: every stage but the terminal one.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.stage_count().saturating_sub(1)
    }

    /// Fully complete once only the terminal stage remains.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stage_count() > 0 && self.current_stage == self.step_count()
    }

    /// The stage the player is working on, if any.
    #[must_use]
    pub fn active_stage(&self) -> Option<&SubGoal> {
        self.stages.get(self.current_stage)
    }
}

/// Baseline captured when tracking of a legacy world began.
///
/// Legacy counters are lifetime-cumulative across worlds, so per-world
/// progress is always `raw - initial_progress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySnapshot {
    pub world_name: Option<String>,
    pub playtime: i64,
    pub captured_at: Option<DateTime<Utc>>,
    /// Baseline per statistic address.
    pub initial_progress: BTreeMap<String, i64>,
    /// Achievements already earned when the baseline was captured.
    pub earned_before: BTreeMap<String, bool>,
}

impl LegacySnapshot {
    /// Baseline for a statistic address; `0` when none was recorded.
    #[must_use]
    pub fn baseline(&self, stat: &str) -> i64 {
        self.initial_progress.get(stat).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn was_earned_before(&self, achievement: &str) -> bool {
        self.earned_before.get(achievement).copied().unwrap_or(false)
    }
}

/// Totals for one section of the template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionCounts {
    pub total: usize,
    pub completed: usize,
    /// Same as `total`, excluding template-hidden entries.
    pub visible_total: usize,
    pub visible_completed: usize,
}

impl SectionCounts {
    /// Adds one entry to the tally.
    pub fn record(&mut self, done: bool, hidden: bool) {
        self.total += 1;
        if done {
            self.completed += 1;
        }
        if !hidden {
            self.visible_total += 1;
            if done {
                self.visible_completed += 1;
            }
        }
    }
}

/// Per-section counters recomputed every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    /// Non-recipe advancements.
    pub advancements: SectionCounts,
    pub recipes: SectionCounts,
    /// Statistic categories, excluding legacy hidden helpers.
    pub stats: SectionCounts,
    pub unlocks: SectionCounts,
    pub custom: SectionCounts,
    pub multi_stage: SectionCounts,
    /// Criteria of non-recipe advancements.
    pub total_criteria_count: usize,
    pub completed_criteria_count: usize,
}

/// Aggregate root: the full completion state for one loaded template.
///
/// Replaced wholesale on template switch so no stale cross-references survive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateData {
    pub advancements: Vec<TrackableCategory>,
    pub stats: Vec<TrackableCategory>,
    pub unlocks: Vec<TrackableItem>,
    pub custom_goals: Vec<TrackableItem>,
    pub multi_stage_goals: Vec<MultiStageGoal>,
    pub counts: ProgressCounts,
    pub legacy: LegacySnapshot,
    pub last_known_world_name: Option<String>,
    /// Ticks played in the current world (legacy: relative to the baseline).
    pub play_time_ticks: i64,
    pub overall_progress_percentage: f64,
    pub total_progress_steps: usize,
    pub completed_progress_steps: usize,
}

impl TemplateData {
    #[must_use]
    pub fn advancement(&self, root_name: &str) -> Option<&TrackableCategory> {
        self.advancements.iter().find(|a| a.root_name == root_name)
    }

    #[must_use]
    pub fn stat_category(&self, root_name: &str) -> Option<&TrackableCategory> {
        self.stats.iter().find(|s| s.root_name == root_name)
    }

    #[must_use]
    pub fn unlock(&self, root_name: &str) -> Option<&TrackableItem> {
        self.unlocks.iter().find(|u| u.root_name == root_name)
    }

    #[must_use]
    pub fn custom_goal(&self, root_name: &str) -> Option<&TrackableItem> {
        self.custom_goals.iter().find(|c| c.root_name == root_name)
    }

    #[must_use]
    pub fn multi_stage_goal(&self, root_name: &str) -> Option<&MultiStageGoal> {
        self.multi_stage_goals
            .iter()
            .find(|g| g.root_name == root_name)
    }

    /// Returns `true` when the template declares nothing to track.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.advancements.is_empty()
            && self.stats.is_empty()
            && self.unlocks.is_empty()
            && self.custom_goals.is_empty()
            && self.multi_stage_goals.is_empty()
    }
}
