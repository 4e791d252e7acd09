//! Template loading.
//!
//! A template is the user-authored list of everything to track. It is parsed
//! once into a [`TemplateData`] (on startup or template switch); the
//! reconciler only ever mutates progress fields afterwards.
//!
//! # Template Format
//!
//! ```json
//! {
//!   "advancements": {
//!     "minecraft:story/mine_stone": { "criteria": { "stone": {} } },
//!     "minecraft:recipes/misc/bread": { "is_recipe": true }
//!   },
//!   "stats": {
//!     "mine_stone": { "root_name": "minecraft:mined/minecraft:stone", "target": 64 },
//!     "travel": { "criteria": { "walk": { "root_name": "minecraft:custom/minecraft:walk_one_cm", "target": 100000 } } }
//!   },
//!   "unlocks": { "minecraft:exploration": {} },
//!   "custom": [ { "root_name": "beat_dragon", "target": 0 } ],
//!   "multi_stage_goals": [
//!     { "root_name": "nether", "stages": [
//!       { "type": "stat", "root_name": "minecraft:mined/minecraft:obsidian", "target": 10 },
//!       { "type": "advancement", "root_name": "minecraft:story/enter_the_nether" },
//!       { "type": "final", "display_text": "Done" }
//!     ] }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use waypost_monitor::template::{parse_template, LangMap};
//!
//! let json = r#"{ "stats": { "jumps": { "root_name": "stat.jump", "target": 10 } } }"#;
//! let data = parse_template(json, &LangMap::default()).unwrap();
//!
//! let jumps = data.stat_category("jumps").unwrap();
//! assert!(jumps.is_single_stat_category);
//! assert_eq!(jumps.criteria[0].goal, 10);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::model::{
    MultiStageGoal, StatKey, SubGoal, SubGoalKind, TemplateData, TrackableCategory,
    TrackableItem, GOAL_UNBOUNDED,
};

/// Errors that can occur while loading a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The template file could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template is not valid JSON or has the wrong shape.
    #[error("invalid template JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A target below the unbounded sentinel.
    #[error("invalid target {target} for '{entry}'")]
    InvalidTarget { entry: String, target: i64 },

    /// Two entries in one section share a root name.
    #[error("duplicate {section} entry '{root_name}'")]
    Duplicate {
        section: &'static str,
        root_name: String,
    },

    /// A multi-stage goal declares no stages.
    #[error("multi-stage goal '{0}' has no stages")]
    EmptyStages(String),

    /// A stage `type` that is not one of the known kinds.
    #[error("multi-stage goal '{goal}' has unknown stage type '{kind}'")]
    UnknownStageType { goal: String, kind: String },

    /// A stage is missing a field its type requires.
    #[error("multi-stage goal '{goal}' stage {index} is missing '{field}'")]
    MissingField {
        goal: String,
        index: usize,
        field: &'static str,
    },
}

/// Display-name overrides keyed by `<section>.<root>` paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangMap(HashMap<String, String>);

impl LangMap {
    /// Loads a flat JSON object of display names.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let contents = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses a flat JSON object of display names; non-string values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] when the JSON is not an object.
    pub fn parse(json: &str) -> Result<Self, TemplateError> {
        let map: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self(
            map.into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect(),
        ))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Lang entry, then template display name, then the root name itself.
    fn resolve(&self, lang_key: &str, declared: Option<&str>, fallback: &str) -> String {
        self.get(lang_key)
            .or(declared)
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTemplate {
    advancements: Entries,
    stats: Entries,
    unlocks: Entries,
    custom: Vec<RawCustom>,
    multi_stage_goals: Vec<RawMultiStage>,
}

/// A keyed section in document order, repeated keys included.
///
/// A plain JSON object map keeps only the last of two equal keys, which
/// would hide a duplicated entry.
#[derive(Debug, Default)]
struct Entries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed by root name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, serde_json::Value>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl Entries {
    /// Fails on the first root name that appears twice.
    fn check_unique(&self, section: &'static str) -> Result<(), TemplateError> {
        let mut seen = HashSet::new();
        for (root_name, _) in &self.0 {
            if !seen.insert(root_name.as_str()) {
                return Err(TemplateError::Duplicate {
                    section,
                    root_name: root_name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAdvancement {
    display_name: Option<String>,
    hidden: bool,
    is_recipe: bool,
    criteria: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCriterion {
    display_name: Option<String>,
    hidden: bool,
    root_name: Option<String>,
    target: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStat {
    display_name: Option<String>,
    hidden: bool,
    root_name: Option<String>,
    target: i64,
    criteria: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUnlock {
    display_name: Option<String>,
    hidden: bool,
}

#[derive(Debug, Deserialize)]
struct RawCustom {
    root_name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    target: i64,
}

#[derive(Debug, Deserialize)]
struct RawMultiStage {
    root_name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    stages: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
struct RawStage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    stage_id: Option<String>,
    #[serde(default)]
    root_name: Option<String>,
    #[serde(default)]
    parent_advancement: Option<String>,
    #[serde(default)]
    target: i64,
    #[serde(default)]
    display_text: Option<String>,
}

/// Deserializes a keyed entry, treating `null` as an empty object.
fn entry<T>(value: &Value) -> Result<T, TemplateError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(value)?)
}

fn check_target(entry: &str, target: i64) -> Result<i64, TemplateError> {
    if target < GOAL_UNBOUNDED {
        return Err(TemplateError::InvalidTarget {
            entry: entry.to_string(),
            target,
        });
    }
    Ok(target)
}

/// Parses template JSON into a fresh [`TemplateData`].
///
/// # Errors
///
/// Returns a [`TemplateError`] for malformed JSON or invalid declarations.
pub fn parse_template(json: &str, lang: &LangMap) -> Result<TemplateData, TemplateError> {
    let raw: RawTemplate = serde_json::from_str(json)?;

    raw.advancements.check_unique("advancements")?;
    raw.stats.check_unique("stats")?;
    raw.unlocks.check_unique("unlocks")?;

    let mut data = TemplateData::default();

    for (root_name, value) in &raw.advancements.0 {
        data.advancements
            .push(build_advancement(root_name, entry(value)?, lang)?);
    }

    for (root_name, value) in &raw.stats.0 {
        data.stats.push(build_stat(root_name, entry(value)?, lang)?);
    }

    for (root_name, value) in &raw.unlocks.0 {
        let unlock: RawUnlock = entry(value)?;
        let display = lang.resolve(
            &format!("unlock.{root_name}"),
            unlock.display_name.as_deref(),
            root_name,
        );
        data.unlocks
            .push(TrackableItem::new(root_name.clone(), display).hidden(unlock.hidden));
    }

    let mut seen = HashSet::new();
    for custom in raw.custom {
        if !seen.insert(custom.root_name.clone()) {
            return Err(TemplateError::Duplicate {
                section: "custom",
                root_name: custom.root_name,
            });
        }
        let goal = check_target(&custom.root_name, custom.target)?;
        let display = lang.resolve(
            &format!("custom.{}", custom.root_name),
            custom.display_name.as_deref(),
            &custom.root_name,
        );
        data.custom_goals.push(
            TrackableItem::new(custom.root_name, display)
                .with_goal(goal)
                .hidden(custom.hidden),
        );
    }

    let mut seen = HashSet::new();
    for goal in raw.multi_stage_goals {
        if !seen.insert(goal.root_name.clone()) {
            return Err(TemplateError::Duplicate {
                section: "multi_stage_goals",
                root_name: goal.root_name,
            });
        }
        data.multi_stage_goals.push(build_multi_stage(goal, lang)?);
    }

    Ok(data)
}

fn build_advancement(
    root_name: &str,
    raw: RawAdvancement,
    lang: &LangMap,
) -> Result<TrackableCategory, TemplateError> {
    let display = lang.resolve(
        &format!("advancement.{root_name}"),
        raw.display_name.as_deref(),
        root_name,
    );
    let mut category = TrackableCategory::new(root_name, display);
    category.is_recipe = raw.is_recipe;
    category.is_hidden = raw.hidden;

    for (criterion_name, value) in &raw.criteria {
        let criterion: RawCriterion = entry(value)?;
        let display = lang.resolve(
            &format!("advancement.{root_name}.criteria.{criterion_name}"),
            criterion.display_name.as_deref(),
            criterion_name,
        );
        category
            .criteria
            .push(TrackableItem::new(criterion_name.clone(), display).hidden(criterion.hidden));
    }

    Ok(category)
}

fn build_stat(
    root_name: &str,
    raw: RawStat,
    lang: &LangMap,
) -> Result<TrackableCategory, TemplateError> {
    let display = lang.resolve(
        &format!("stat.{root_name}"),
        raw.display_name.as_deref(),
        root_name,
    );

    let Some(criteria) = raw.criteria else {
        let goal = check_target(root_name, raw.target)?;
        let address = raw.root_name.as_deref().unwrap_or(root_name);
        let mut category =
            TrackableCategory::single_stat(root_name, display, StatKey::parse(address), goal);
        category.is_hidden = raw.hidden;
        if let Some(criterion) = category.criteria.first_mut() {
            criterion.is_hidden = raw.hidden;
        }
        return Ok(category);
    };

    let mut category = TrackableCategory::new(root_name, display);
    category.is_hidden = raw.hidden;

    for (criterion_name, value) in &criteria {
        let criterion: RawCriterion = entry(value)?;
        let goal = check_target(&format!("{root_name}.{criterion_name}"), criterion.target)?;
        let address = criterion.root_name.as_deref().unwrap_or(criterion_name);
        let display = lang.resolve(
            &format!("stat.{root_name}.criteria.{criterion_name}"),
            criterion.display_name.as_deref(),
            criterion_name,
        );
        category.criteria.push(
            TrackableItem::new(criterion_name.clone(), display)
                .with_goal(goal)
                .with_stat_key(StatKey::parse(address))
                .hidden(criterion.hidden),
        );
    }

    Ok(category)
}

fn build_multi_stage(raw: RawMultiStage, lang: &LangMap) -> Result<MultiStageGoal, TemplateError> {
    if raw.stages.is_empty() {
        return Err(TemplateError::EmptyStages(raw.root_name));
    }

    let goal_name = raw.root_name;
    let mut stages = Vec::with_capacity(raw.stages.len() + 1);

    for (index, stage) in raw.stages.into_iter().enumerate() {
        let required = |value: Option<String>, field: &'static str| {
            value.ok_or_else(|| TemplateError::MissingField {
                goal: goal_name.clone(),
                index,
                field,
            })
        };

        let kind = match stage.kind.as_str() {
            "advancement" | "achievement" => SubGoalKind::Advancement {
                root_name: required(stage.root_name, "root_name")?,
            },
            "stat" => {
                let address = required(stage.root_name, "root_name")?;
                if stage.target < 1 {
                    return Err(TemplateError::InvalidTarget {
                        entry: format!("{goal_name}.stages[{index}]"),
                        target: stage.target,
                    });
                }
                SubGoalKind::Stat {
                    key: StatKey::parse(&address),
                    required_progress: stage.target,
                    current_stat_progress: 0,
                }
            }
            "unlock" => SubGoalKind::Unlock {
                root_name: required(stage.root_name, "root_name")?,
            },
            "criterion" => SubGoalKind::Criterion {
                parent: required(stage.parent_advancement, "parent_advancement")?,
                criterion: required(stage.root_name, "root_name")?,
            },
            "final" | "manual" => SubGoalKind::Manual,
            other => {
                return Err(TemplateError::UnknownStageType {
                    goal: goal_name.clone(),
                    kind: other.to_string(),
                })
            }
        };

        let stage_id = stage.stage_id.unwrap_or_else(|| format!("stage_{index}"));
        stages.push(SubGoal {
            display_text: stage.display_text.unwrap_or_else(|| stage_id.clone()),
            stage_id,
            kind,
        });
    }

    if stages.last().is_some_and(|s| !s.is_manual()) {
        warn!(goal = %goal_name, "Multi-stage goal has no final stage, appending one");
        stages.push(SubGoal {
            stage_id: "final".to_string(),
            display_text: "Complete".to_string(),
            kind: SubGoalKind::Manual,
        });
    }

    let display = lang.resolve(
        &format!("multi_stage.{goal_name}"),
        raw.display_name.as_deref(),
        &goal_name,
    );

    Ok(MultiStageGoal {
        root_name: goal_name,
        display_name: display,
        stages,
        current_stage: 0,
        is_hidden: raw.hidden,
    })
}

/// Reads and parses a template file, with an optional display-name map.
///
/// A lang file that cannot be loaded only costs display names, so it is
/// logged and skipped.
///
/// # Errors
///
/// Returns a [`TemplateError`] when the template itself cannot be loaded.
pub fn load_template(path: &Path, lang_path: Option<&Path>) -> Result<TemplateData, TemplateError> {
    let contents = fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let lang = match lang_path {
        Some(lang_path) => LangMap::load(lang_path).unwrap_or_else(|e| {
            warn!(path = %lang_path.display(), error = %e, "Failed to load lang file, using raw names");
            LangMap::default()
        }),
        None => LangMap::default(),
    };

    let data = parse_template(&contents, &lang)?;

    info!(
        path = %path.display(),
        advancements = data.advancements.len(),
        stats = data.stats.len(),
        unlocks = data.unlocks.len(),
        custom = data.custom_goals.len(),
        multi_stage = data.multi_stage_goals.len(),
        "Template loaded"
    );

    Ok(data)
}

/// Loads a template, falling back to the empty built-in template on failure.
///
/// The caller always gets a usable model; the error is logged.
#[must_use]
pub fn load_or_default(path: &Path, lang_path: Option<&Path>) -> TemplateData {
    load_template(path, lang_path).unwrap_or_else(|e| {
        error!(path = %path.display(), error = %e, "Failed to load template, using default");
        TemplateData::default()
    })
}
