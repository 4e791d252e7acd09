//! Multi-stage goal evaluation.
//!
//! Every pass rescans each goal from its first stage and stops at the first
//! stage that is not complete, so `current_stage` always counts consecutive
//! completed stages and regresses when the world or a source does.
//!
//! If a stage needs a source that is absent this pass, the goal keeps the
//! stage it had: an unreadable file must not look like lost progress.

use serde_json::Value;
use tracing::trace;

use crate::era::Era;
use crate::model::{LegacySnapshot, MultiStageGoal, SubGoal, SubGoalKind, TrackableCategory};
use crate::sources::Snapshots;

use super::{advancement_tracker, stat_tracker, unlock_tracker};

/// Already-updated state the evaluator reads from.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub era: Era,
    pub advancements: &'a [TrackableCategory],
    pub snapshots: &'a Snapshots,
    pub legacy: &'a LegacySnapshot,
}

impl StageContext<'_> {
    fn achievements(&self) -> Option<&Value> {
        if self.era.is_known() {
            self.snapshots.achievements(self.era)
        } else {
            None
        }
    }

    fn stats(&self) -> Option<&Value> {
        if self.era.is_known() {
            self.snapshots.stats.as_ref()
        } else {
            None
        }
    }
}

/// Outcome of evaluating one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageStatus {
    Complete,
    Incomplete,
    /// The stage's source is absent this pass.
    Unknown,
    /// Terminal marker; scanning stops.
    Terminal,
}

fn evaluate_stage(stage: &SubGoal, ctx: &StageContext<'_>) -> (StageStatus, Option<i64>) {
    let status = |complete: bool| {
        if complete {
            StageStatus::Complete
        } else {
            StageStatus::Incomplete
        }
    };

    match &stage.kind {
        SubGoalKind::Manual => (StageStatus::Terminal, None),

        SubGoalKind::Advancement { root_name } => {
            let Some(doc) = ctx.achievements() else {
                return (StageStatus::Unknown, None);
            };
            let done = ctx
                .advancements
                .iter()
                .find(|a| a.root_name == *root_name)
                .map_or_else(
                    || advancement_tracker::entry_done(ctx.era, doc, root_name),
                    |a| a.done,
                );
            (status(done), None)
        }

        SubGoalKind::Stat {
            key,
            required_progress,
            ..
        } => {
            let Some(doc) = ctx.stats() else {
                return (StageStatus::Unknown, None);
            };
            let value = stat_tracker::stat_progress(ctx.era, doc, key, ctx.legacy);
            (status(value >= *required_progress), Some(value))
        }

        SubGoalKind::Unlock { root_name } => match ctx.snapshots.unlocks.as_ref() {
            Some(doc) => (status(unlock_tracker::obtained(doc, root_name)), None),
            None => (StageStatus::Unknown, None),
        },

        SubGoalKind::Criterion { parent, criterion } => {
            let Some(doc) = ctx.achievements() else {
                return (StageStatus::Unknown, None);
            };
            let present = advancement_tracker::criterion_present(ctx.era, doc, parent, criterion);
            (status(present), None)
        }
    }
}

/// Rescans one goal. Returns `None` when a needed source is absent.
fn scan(goal: &MultiStageGoal, ctx: &StageContext<'_>) -> Option<(usize, Vec<(usize, i64)>)> {
    let mut reached = 0;
    let mut observed = Vec::new();

    for (index, stage) in goal.stages.iter().enumerate() {
        let (status, value) = evaluate_stage(stage, ctx);
        if let Some(value) = value {
            observed.push((index, value));
        }
        match status {
            StageStatus::Complete => reached = index + 1,
            StageStatus::Incomplete | StageStatus::Terminal => break,
            StageStatus::Unknown => return None,
        }
    }

    Some((reached, observed))
}

/// Re-derives `current_stage` for every goal.
pub fn evaluate_goals(goals: &mut [MultiStageGoal], ctx: &StageContext<'_>) {
    for goal in goals.iter_mut() {
        let Some((reached, observed)) = scan(goal, ctx) else {
            trace!(goal = %goal.root_name, "Stage source unavailable, keeping stage");
            continue;
        };

        for (index, value) in observed {
            if let Some(SubGoalKind::Stat {
                current_stat_progress,
                ..
            }) = goal.stages.get_mut(index).map(|s| &mut s.kind)
            {
                *current_stat_progress = value;
            }
        }
        goal.current_stage = reached;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatKey;
    use serde_json::json;

    fn stage(kind: SubGoalKind) -> SubGoal {
        SubGoal {
            stage_id: String::new(),
            display_text: String::new(),
            kind,
        }
    }

    fn stat_stage(address: &str, target: i64) -> SubGoal {
        stage(SubGoalKind::Stat {
            key: StatKey::parse(address),
            required_progress: target,
            current_stat_progress: 0,
        })
    }

    fn goal(stages: Vec<SubGoal>) -> MultiStageGoal {
        MultiStageGoal {
            root_name: "g".to_string(),
            display_name: "G".to_string(),
            stages,
            current_stage: 0,
            is_hidden: false,
        }
    }

    fn modern(stats: Value, advancements: Value, unlocks: Option<Value>) -> Snapshots {
        Snapshots {
            world_name: Some("W".to_string()),
            advancements: Some(advancements),
            stats: Some(stats),
            unlocks,
        }
    }

    #[test]
    fn strict_ordering_stops_at_first_incomplete_stage() {
        let mut goals = vec![goal(vec![
            stat_stage("minecraft:custom/minecraft:jump", 10),
            stage(SubGoalKind::Advancement {
                root_name: "x".to_string(),
            }),
            stage(SubGoalKind::Manual),
        ])];
        let snapshots = modern(
            json!({"stats": {"minecraft:custom": {"minecraft:jump": 12}}}),
            json!({}),
            None,
        );
        let legacy = LegacySnapshot::default();
        let ctx = StageContext {
            era: Era::Modern,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };

        evaluate_goals(&mut goals, &ctx);

        assert_eq!(goals[0].current_stage, 1);
        assert!(matches!(
            goals[0].stages[0].kind,
            SubGoalKind::Stat { current_stat_progress: 12, .. }
        ));
    }

    #[test]
    fn later_true_stage_does_not_skip_earlier_false_one() {
        let mut goals = vec![goal(vec![
            stage(SubGoalKind::Unlock {
                root_name: "u".to_string(),
            }),
            stat_stage("minecraft:custom/minecraft:jump", 1),
            stage(SubGoalKind::Manual),
        ])];
        let snapshots = modern(
            json!({"stats": {"minecraft:custom": {"minecraft:jump": 5}}}),
            json!({}),
            Some(json!({"obtained": []})),
        );
        let legacy = LegacySnapshot::default();
        let ctx = StageContext {
            era: Era::Modern,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 0);
    }

    #[test]
    fn full_completion_stops_at_terminal_stage() {
        let mut goals = vec![goal(vec![
            stage(SubGoalKind::Criterion {
                parent: "a".to_string(),
                criterion: "c".to_string(),
            }),
            stage(SubGoalKind::Manual),
        ])];
        let snapshots = modern(
            json!({}),
            json!({"a": {"criteria": {"c": "t"}, "done": false}}),
            None,
        );
        let legacy = LegacySnapshot::default();
        let ctx = StageContext {
            era: Era::Hybrid,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 1);
        assert!(goals[0].is_complete());
    }

    #[test]
    fn template_advancement_state_is_preferred() {
        let mut adv = TrackableCategory::new("x", "X");
        adv.done = true;
        let mut goals = vec![goal(vec![
            stage(SubGoalKind::Advancement {
                root_name: "x".to_string(),
            }),
            stage(SubGoalKind::Manual),
        ])];
        let snapshots = modern(json!({}), json!({}), None);
        let legacy = LegacySnapshot::default();
        let advancements = [adv];
        let ctx = StageContext {
            era: Era::Modern,
            advancements: &advancements,
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 1);
    }

    #[test]
    fn regression_is_rederived() {
        let mut goals = vec![goal(vec![
            stat_stage("stat.jump", 3),
            stage(SubGoalKind::Manual),
        ])];
        goals[0].current_stage = 1;
        let snapshots = Snapshots {
            stats: Some(json!({"stat.jump": 0})),
            ..Snapshots::default()
        };
        let legacy = LegacySnapshot::default();
        let ctx = StageContext {
            era: Era::Mid,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 0);
    }

    #[test]
    fn absent_source_keeps_previous_stage() {
        let mut goals = vec![goal(vec![
            stat_stage("stat.jump", 3),
            stage(SubGoalKind::Manual),
        ])];
        goals[0].current_stage = 1;
        let snapshots = Snapshots::default();
        let legacy = LegacySnapshot::default();
        let ctx = StageContext {
            era: Era::Mid,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 1);
    }

    #[test]
    fn legacy_stat_stage_is_baseline_relative() {
        let mut goals = vec![goal(vec![stat_stage("2000", 3), stage(SubGoalKind::Manual)])];
        let snapshots = Snapshots {
            stats: Some(json!({"2000": 7})),
            ..Snapshots::default()
        };
        let mut legacy = LegacySnapshot::default();
        legacy.initial_progress.insert("2000".to_string(), 5);
        let ctx = StageContext {
            era: Era::Legacy,
            advancements: &[],
            snapshots: &snapshots,
            legacy: &legacy,
        };
        evaluate_goals(&mut goals, &ctx);
        assert_eq!(goals[0].current_stage, 0);
        assert!(matches!(
            goals[0].stages[0].kind,
            SubGoalKind::Stat { current_stat_progress: 2, .. }
        ));
    }
}
