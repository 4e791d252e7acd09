//! Integration tests for a tracking session over a real saves directory.
//!
//! These lay out world folders in a temporary directory the way the game
//! does and drive [`Tracker`] tick by tick.

use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use waypost_monitor::config::Config;
use waypost_monitor::era::GameVersion;
use waypost_monitor::settings::{CustomValue, JsonStateStore, StateStore};
use waypost_monitor::sources::SourceKind;
use waypost_monitor::{MonitorError, Tracker};

// ============================================================================
// Helper Functions
// ============================================================================

const TEMPLATE: &str = r#"{
    "advancements": {
        "minecraft:story/mine_stone": { "criteria": { "get_stone": {} } }
    },
    "stats": {
        "jumps": { "root_name": "minecraft:custom/minecraft:jump", "target": 10 }
    },
    "custom": [
        { "root_name": "beat_game", "target": 0 },
        { "root_name": "cured", "target": 5 },
        { "root_name": "fish", "target": -1 }
    ]
}"#;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("has parent")).expect("Failed to create dir");
    fs::write(path, content).expect("Failed to write file");
}

/// Sets the modification time of `path` to `secs_ago` seconds in the past.
fn touch(path: &Path, secs_ago: u64) {
    let time = SystemTime::now() - Duration::from_secs(secs_ago);
    fs::File::open(path)
        .expect("Failed to open for touch")
        .set_modified(time)
        .expect("Failed to set mtime");
}

fn config(root: &Path, version: &str, template: &str) -> Config {
    let template_path = root.join("template.json");
    fs::write(&template_path, template).expect("Failed to write template");
    Config {
        version: GameVersion::parse(version),
        template_path,
        lang_path: None,
        saves_dir: root.join("saves"),
        state_path: root.join("state").join("state.json"),
        debounce: Duration::from_millis(250),
        tick_interval: Duration::from_secs(5),
    }
}

fn modern_world(root: &Path, name: &str, jumps: i64) -> PathBuf {
    let world = root.join("saves").join(name);
    write(
        &world.join("advancements").join("player.json"),
        r#"{"minecraft:story/mine_stone": {"criteria": {"get_stone": "2024-01-01"}, "done": true}}"#,
    );
    write(
        &world.join("stats").join("player.json"),
        &format!(r#"{{"stats": {{"minecraft:custom": {{"minecraft:jump": {jumps}}}}}}}"#),
    );
    world
}

// ============================================================================
// Snapshot handling
// ============================================================================

#[test]
fn test_unreadable_snapshot_keeps_previous_state() {
    let root = TempDir::new().unwrap();
    let world = modern_world(root.path(), "World", 12);
    let mut tracker = Tracker::open(&config(root.path(), "1.20.4", TEMPLATE)).unwrap();

    let report = tracker.tick();
    assert!(report.skipped.contains(&SourceKind::Unlocks));
    assert!(tracker.data().stat_category("jumps").unwrap().done);
    let before = tracker.data().overall_progress_percentage;

    // A file caught mid-write.
    fs::write(world.join("stats").join("player.json"), r#"{"stats": {"minecraft:cus"#).unwrap();
    let report = tracker.tick();

    assert!(report.skipped.contains(&SourceKind::Stats));
    let jumps = tracker.data().stat_category("jumps").unwrap();
    assert!(jumps.done);
    assert_eq!(jumps.criteria[0].progress, 12);
    assert_eq!(tracker.data().overall_progress_percentage, before);
}

#[test]
fn test_newest_file_in_source_directory_wins() {
    let root = TempDir::new().unwrap();
    let world = modern_world(root.path(), "World", 3);
    let stats_dir = world.join("stats");
    write(
        &stats_dir.join("other-player.json"),
        r#"{"stats": {"minecraft:custom": {"minecraft:jump": 20}}}"#,
    );
    touch(&stats_dir.join("player.json"), 60);

    let mut tracker = Tracker::open(&config(root.path(), "1.20.4", TEMPLATE)).unwrap();
    tracker.tick();

    assert_eq!(
        tracker.data().stat_category("jumps").unwrap().criteria[0].progress,
        20
    );
}

#[test]
fn test_no_world_yet() {
    let root = TempDir::new().unwrap();
    let mut tracker = Tracker::open(&config(root.path(), "1.20.4", TEMPLATE)).unwrap();

    let report = tracker.tick();

    assert!(report.world.is_none());
    assert_eq!(tracker.data().completed_progress_steps, 0);
    assert!(tracker.summary().contains("(no world)"));
}

// ============================================================================
// World switching
// ============================================================================

#[test]
fn test_switching_to_newer_world_resets_toggles() {
    let root = TempDir::new().unwrap();
    let first = modern_world(root.path(), "First", 0);
    touch(&first, 120);
    let cfg = config(root.path(), "1.20.4", TEMPLATE);
    let store = JsonStateStore::new(&cfg.state_path);

    let mut tracker = Tracker::open(&cfg).unwrap();
    tracker.tick();

    let mut state = store.load().unwrap();
    state.set_override("jumps", true);
    store.save(&state).unwrap();
    tracker.tick();
    assert!(tracker.data().stat_category("jumps").unwrap().done);

    modern_world(root.path(), "Second", 0);
    let report = tracker.tick();

    assert!(report.world_changed);
    assert_eq!(report.world.as_deref(), Some("Second"));
    assert!(!tracker.data().stat_category("jumps").unwrap().done);
    let persisted = store.load().unwrap();
    assert!(persisted.stat_overrides.is_empty());
    assert_eq!(persisted.last_world_name.as_deref(), Some("Second"));
}

#[test]
fn test_restart_on_same_world_keeps_toggles() {
    let root = TempDir::new().unwrap();
    modern_world(root.path(), "World", 0);
    let cfg = config(root.path(), "1.20.4", TEMPLATE);

    let mut tracker = Tracker::open(&cfg).unwrap();
    tracker.tick();
    let store = JsonStateStore::new(&cfg.state_path);
    let mut state = store.load().unwrap();
    state.set_custom_progress("beat_game", CustomValue::Flag(true));
    store.save(&state).unwrap();
    drop(tracker);

    let mut tracker = Tracker::open(&cfg).unwrap();
    let report = tracker.tick();

    assert!(!report.world_changed);
    assert!(tracker.data().custom_goal("beat_game").unwrap().done);
}

// ============================================================================
// Custom goals through the state file
// ============================================================================

#[test]
fn test_custom_values_written_between_ticks() {
    let root = TempDir::new().unwrap();
    modern_world(root.path(), "World", 0);
    let cfg = config(root.path(), "1.20.4", TEMPLATE);
    let store = JsonStateStore::new(&cfg.state_path);
    let mut tracker = Tracker::open(&cfg).unwrap();
    tracker.tick();

    let mut state = store.load().unwrap();
    for (key, value) in [("beat_game", "true"), ("cured", "3"), ("fish", "42")] {
        state.set_custom_progress(key, value.parse::<CustomValue>().unwrap());
    }
    store.save(&state).unwrap();
    tracker.tick();

    let data = tracker.data();
    assert!(data.custom_goal("beat_game").unwrap().done);
    assert_eq!(data.custom_goal("cured").unwrap().progress, 3);
    assert!(!data.custom_goal("cured").unwrap().done);
    assert_eq!(data.custom_goal("fish").unwrap().progress, 42);
    assert!(!data.custom_goal("fish").unwrap().done);

    let mut state = store.load().unwrap();
    state.set_custom_progress("cured", CustomValue::Count(5));
    state.set_custom_progress("fish", CustomValue::Flag(true));
    store.save(&state).unwrap();
    tracker.tick();

    let data = tracker.data();
    assert!(data.custom_goal("cured").unwrap().done);
    assert!(data.custom_goal("fish").unwrap().done);
    assert!(data.custom_goal("fish").unwrap().is_manually_completed);
}

// ============================================================================
// Legacy layout
// ============================================================================

#[test]
fn test_legacy_stats_read_beside_saves() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("saves").join("Old World")).unwrap();
    let stats_file = root.path().join("stats").join("stats_player_unsent.dat");
    write(
        &stats_file,
        r#"{"stats-change": [{"1100": 72000}, {"2010": 5}, {"5242880": 1}], "checksum": "x"}"#,
    );

    let template = r#"{
        "advancements": { "5242880": {} },
        "stats": { "jumps": { "root_name": "2010", "target": 3 } }
    }"#;
    let cfg = config(root.path(), "1.6.4", template);
    let mut tracker = Tracker::open(&cfg).unwrap();
    assert_eq!(tracker.watch_dirs().len(), 2);

    let report = tracker.tick();
    assert!(report.baseline_captured);
    assert_eq!(tracker.data().play_time_ticks, 0);
    assert!(tracker.data().advancement("5242880").unwrap().done);

    write(
        &stats_file,
        r#"{"stats-change": [{"1100": 76000}, {"2010": 5}, {"2010": 4}, {"5242880": 1}]}"#,
    );
    let report = tracker.tick();
    assert!(!report.baseline_captured);
    let jumps = tracker.data().stat_category("jumps").unwrap();
    assert_eq!(jumps.criteria[0].progress, 4);
    assert!(jumps.done);
    assert_eq!(tracker.data().play_time_ticks, 4000);

    let persisted = JsonStateStore::new(&cfg.state_path).load().unwrap();
    assert_eq!(persisted.legacy_snapshot.baseline("2010"), 5);
    assert_eq!(persisted.legacy_snapshot.playtime, 72000);
}

// ============================================================================
// Environment configuration
// ============================================================================

/// Removes every `WAYPOST_*` variable and returns what was set.
fn clear_waypost_env() -> Vec<(String, String)> {
    let saved: Vec<(String, String)> = env::vars()
        .filter(|(k, _)| k.starts_with("WAYPOST_"))
        .collect();
    for (key, _) in &saved {
        env::remove_var(key);
    }
    saved
}

fn restore_waypost_env(saved: Vec<(String, String)>) {
    let set: Vec<String> = env::vars()
        .map(|(k, _)| k)
        .filter(|k| k.starts_with("WAYPOST_"))
        .collect();
    for key in set {
        env::remove_var(key);
    }
    for (key, value) in saved {
        env::set_var(key, value);
    }
}

#[test]
#[serial]
fn test_tracker_from_environment() {
    let root = TempDir::new().unwrap();
    modern_world(root.path(), "World", 11);
    let template_path = root.path().join("t.json");
    fs::write(&template_path, TEMPLATE).unwrap();

    let saved = clear_waypost_env();
    env::set_var("WAYPOST_VERSION", "1.20.4");
    env::set_var("WAYPOST_TEMPLATE", &template_path);
    env::set_var("WAYPOST_SAVES_DIR", root.path().join("saves"));
    env::set_var("WAYPOST_STATE_PATH", root.path().join("state.json"));

    let opened = Tracker::from_env();
    restore_waypost_env(saved);

    let (config, mut tracker) = opened.expect("valid configuration");
    assert_eq!(config.version, GameVersion::parse("1.20.4"));
    tracker.tick();
    let summary = tracker.summary();
    assert!(summary.contains("Overall: 40.00% (2/5 steps)"), "{summary}");
    assert!(root.path().join("state.json").exists());
}

#[test]
#[serial]
fn test_tracker_from_environment_without_version() {
    let root = TempDir::new().unwrap();
    let saved = clear_waypost_env();
    env::set_var("WAYPOST_TEMPLATE", root.path().join("t.json"));

    let opened = Tracker::from_env();
    restore_waypost_env(saved);

    assert!(matches!(opened, Err(MonitorError::Config(_))));
}
