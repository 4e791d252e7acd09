//! Waypost Monitor - completion tracker for game progress snapshots.
//!
//! This binary reconciles the active world's progress files against a
//! completion template and reports the overall completion percentage.
//!
//! # Commands
//!
//! - `waypost-monitor status`: Run one tick and print the summary
//! - `waypost-monitor run`: Watch the saves directory and reconcile on change
//! - `waypost-monitor override <key>`: Force a statistic goal complete
//! - `waypost-monitor custom <key> <value>`: Record custom-goal progress
//! - `waypost-monitor reset`: Clear manual progress and the legacy baseline
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use waypost_monitor::config::state_path_from_env;
use waypost_monitor::engine::TickReport;
use waypost_monitor::model::LegacySnapshot;
use waypost_monitor::settings::{CustomValue, JsonStateStore, PersistedState, StateStore};
use waypost_monitor::utils::Debouncer;
use waypost_monitor::watcher::WatchEvent;
use waypost_monitor::Tracker;

/// Capacity of the raw watch event channel.
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the debounced tick channel.
const TICK_CHANNEL_CAPACITY: usize = 16;

/// Debounce key shared by every progress file; any burst yields one tick.
const SNAPSHOT_KEY: &str = "snapshots";

/// Waypost Monitor - completion tracker for game progress snapshots.
///
/// Reads the active world's achievements, statistics and unlocks and
/// reconciles them against a completion template.
#[derive(Parser, Debug)]
#[command(name = "waypost-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    WAYPOST_VERSION      Game version, e.g. 1.12.2 (required for 'status' and 'run')
    WAYPOST_TEMPLATE     Completion template JSON (required for 'status' and 'run')
    WAYPOST_LANG         Display-name map JSON
    WAYPOST_SAVES_DIR    Saves directory (default: ~/.minecraft/saves)
    WAYPOST_STATE_PATH   State file (default: ~/.waypost/state.json)
    WAYPOST_DEBOUNCE_MS  Quiet period before a change triggers a tick (default: 250)
    WAYPOST_TICK_SECS    Fallback tick interval (default: 5)

EXAMPLES:
    # Show current progress
    export WAYPOST_VERSION=1.16.5 WAYPOST_TEMPLATE=~/templates/all_advancements.json
    waypost-monitor status

    # Keep tracking while playing
    waypost-monitor run

    # Tick off a statistic goal by hand, then undo it
    waypost-monitor override minecraft:jump
    waypost-monitor override minecraft:jump --clear

    # Record custom goals
    waypost-monitor custom beat_the_game true
    waypost-monitor custom villagers_cured 7
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation tick and print the summary.
    Status {
        /// Use this template instead of WAYPOST_TEMPLATE.
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// Start the tracker.
    ///
    /// Watches the saves directory and reconciles after every burst of
    /// progress file changes, with a periodic fallback tick.
    Run,

    /// Set or clear a manual statistic override.
    ///
    /// Keys are a statistic category (`<category>`) or one of its criteria
    /// (`<category>.criteria.<criterion>`).
    Override {
        key: String,

        /// Remove the override instead of setting it.
        #[arg(long)]
        clear: bool,
    },

    /// Record progress for a custom goal: `true`, `false` or a count.
    Custom {
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Clear overrides, custom progress and the legacy baseline.
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Status { template } => {
            init_logging("warn");
            run_status(template)
        }
        Command::Run => {
            init_logging("info");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_monitor())
        }
        Command::Override { key, clear } => {
            init_logging("warn");
            edit_state(|state| {
                if !clear {
                    state.set_override(key.as_str(), true);
                    format!("Marked {key} complete")
                } else if state.clear_override(&key) {
                    format!("Cleared override for {key}")
                } else {
                    format!("No override set for {key}")
                }
            })
        }
        Command::Custom { key, value } => {
            init_logging("warn");
            let value: CustomValue = value
                .parse()
                .with_context(|| format!("Invalid value for custom goal {key}"))?;
            edit_state(|state| {
                state.set_custom_progress(key.as_str(), value);
                format!("Set {key} = {value}")
            })
        }
        Command::Reset => {
            init_logging("warn");
            edit_state(|state| {
                state.reset_world_progress();
                state.legacy_snapshot = LegacySnapshot::default();
                "Cleared manual progress and legacy baseline".to_string()
            })
        }
    }
}

/// Runs the status command: one tick, then the summary on stdout.
fn run_status(template: Option<PathBuf>) -> Result<()> {
    let (_, mut tracker) = Tracker::from_env().context("Failed to open tracker")?;

    if let Some(path) = template {
        tracker
            .switch_template(&path)
            .context(format!("Failed to load template {}", path.display()))?;
    }

    let report = tracker.tick();
    for kind in &report.skipped {
        warn!(source = %kind, "Source unavailable this tick");
    }

    print!("{}", tracker.summary());
    Ok(())
}

/// Loads the state file, applies `edit` and writes it back, then prints
/// the message `edit` returned.
fn edit_state<F>(edit: F) -> Result<()>
where
    F: FnOnce(&mut PersistedState) -> String,
{
    let path = state_path_from_env().context("Failed to resolve state path")?;
    let store = JsonStateStore::new(&path);

    let mut state = store
        .load()
        .context(format!("Failed to load state from {}", path.display()))?;
    let message = edit(&mut state);
    store
        .save(&state)
        .context(format!("Failed to save state to {}", path.display()))?;

    debug!(path = %path.display(), "State updated");
    println!("{message}");
    Ok(())
}

/// Runs the tracker until a shutdown signal arrives.
async fn run_monitor() -> Result<()> {
    info!("Starting Waypost Monitor");

    let (config, mut tracker) = Tracker::from_env().context("Failed to open tracker")?;

    info!(
        version = %config.version,
        era = %config.version.era(),
        template = %config.template_path.display(),
        saves_dir = %config.saves_dir.display(),
        "Configuration loaded"
    );

    match tracker.active_world() {
        Ok(Some(world)) => info!(world = %world.name, "Active world found"),
        Ok(None) => info!("No world yet, waiting for one to appear"),
        Err(e) => warn!(error = %e, "Failed to list saves directory"),
    }

    let (watch_tx, mut watch_rx) = mpsc::channel::<WatchEvent>(WATCH_CHANNEL_CAPACITY);
    let (ready_tx, mut ready_rx) = mpsc::channel::<(&'static str, PathBuf)>(TICK_CHANNEL_CAPACITY);
    let debouncer = Debouncer::new(config.debounce, ready_tx);

    // Held until shutdown; dropping it stops the watch.
    let watcher = tracker
        .watcher(watch_tx)
        .context("Failed to initialize file watcher")?;
    match &watcher {
        Some(watcher) => info!(dirs = ?watcher.watch_dirs(), "File watcher initialized"),
        None => warn!(
            saves_dir = %config.saves_dir.display(),
            "Saves directory not found, relying on periodic ticks"
        ),
    }

    // The first tick completes immediately and serves as the initial reconciliation.
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!("Monitor running. Press Ctrl+C to stop.");

    let mut last_percentage: Option<f64> = None;
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }

            Some(event) = watch_rx.recv() => {
                debug!(path = %event.path().display(), "Progress file changed");
                if !debouncer.try_send(SNAPSHOT_KEY, event.path().to_path_buf()) {
                    warn!("Debouncer queue full, change will be picked up by the next tick");
                }
            }

            Some((_, path)) = ready_rx.recv() => {
                debug!(path = %path.display(), "Change burst settled");
                let report = tracker.tick();
                log_report(&report, &mut last_percentage);
                interval.reset();
            }

            _ = interval.tick() => {
                let report = tracker.tick();
                log_report(&report, &mut last_percentage);
            }
        }
    }

    info!(
        percentage = tracker.data().overall_progress_percentage,
        "Shutting down"
    );
    Ok(())
}

/// Logs a tick at info level when something visible changed.
fn log_report(report: &TickReport, last_percentage: &mut Option<f64>) {
    let changed = *last_percentage != Some(report.percentage);
    if changed || report.world_changed || report.baseline_captured {
        info!(
            era = %report.era,
            world = report.world.as_deref().unwrap_or("-"),
            world_changed = report.world_changed,
            baseline_captured = report.baseline_captured,
            percentage = %format!("{:.2}", report.percentage),
            "Progress updated"
        );
    } else {
        debug!(percentage = report.percentage, "Tick complete, no change");
    }
    if !report.skipped.is_empty() {
        debug!(skipped = ?report.skipped, "Sources skipped this tick");
    }
    *last_percentage = Some(report.percentage);
}

/// Initializes the tracing subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `default_level`.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
