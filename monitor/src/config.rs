//! Configuration for the Waypost monitor.
//!
//! All settings come from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `WAYPOST_VERSION` | Yes | - | Game version, e.g. `1.12.2` or `1.20.4` |
//! | `WAYPOST_TEMPLATE` | Yes | - | Path to the completion template JSON |
//! | `WAYPOST_LANG` | No | - | Path to a display-name map JSON |
//! | `WAYPOST_SAVES_DIR` | No | `~/.minecraft/saves` | Directory holding the world folders |
//! | `WAYPOST_STATE_PATH` | No | `~/.waypost/state.json` | Overrides, custom progress and legacy baseline |
//! | `WAYPOST_DEBOUNCE_MS` | No | 250 | Quiet period before a file change triggers a tick |
//! | `WAYPOST_TICK_SECS` | No | 5 | Fallback tick interval (1-3600) |
//!
//! # Example
//!
//! ```no_run
//! use waypost_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Tracking {} ({})", config.version, config.version.era());
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

use crate::era::GameVersion;

/// Default debounce window in milliseconds.
const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Default fallback tick interval in seconds.
const DEFAULT_TICK_SECS: u64 = 5;

/// Upper bound for the fallback tick interval.
const MAX_TICK_SECS: u64 = 3600;

/// Default saves directory relative to home.
const DEFAULT_SAVES_DIR: [&str; 2] = [".minecraft", "saves"];

/// Default state directory name relative to home.
const DEFAULT_STATE_DIR: &str = ".waypost";

/// State file name inside the state directory.
const STATE_FILE_NAME: &str = "state.json";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Waypost monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Game version being tracked; selects the era.
    pub version: GameVersion,

    /// Completion template to load.
    pub template_path: PathBuf,

    /// Optional display-name map.
    pub lang_path: Option<PathBuf>,

    /// Directory scanned for the active world.
    pub saves_dir: PathBuf,

    /// Location of the persisted engine state.
    pub state_path: PathBuf,

    /// Quiet period after the last file change before ticking.
    pub debounce: Duration,

    /// Interval of the fallback periodic tick.
    pub tick_interval: Duration,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `WAYPOST_VERSION` or `WAYPOST_TEMPLATE` is not set
    /// - `WAYPOST_VERSION` is empty
    /// - `WAYPOST_DEBOUNCE_MS` or `WAYPOST_TICK_SECS` is out of range
    /// - The home directory cannot be determined (needed for default paths)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let home_dir = base_dirs.home_dir();

        let version = required("WAYPOST_VERSION")?;
        if version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "WAYPOST_VERSION".to_string(),
                message: "version cannot be empty".to_string(),
            });
        }
        let version = GameVersion::parse(version.trim());

        let template_path = PathBuf::from(required("WAYPOST_TEMPLATE")?);

        let lang_path = env::var("WAYPOST_LANG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let saves_dir = env::var("WAYPOST_SAVES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| DEFAULT_SAVES_DIR.iter().fold(home_dir.to_path_buf(), |p, c| p.join(c)));

        let state_path = state_path_in(home_dir);

        let debounce_ms = parse_u64("WAYPOST_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS, 1, u64::MAX)?;
        let tick_secs = parse_u64("WAYPOST_TICK_SECS", DEFAULT_TICK_SECS, 1, MAX_TICK_SECS)?;

        Ok(Self {
            version,
            template_path,
            lang_path,
            saves_dir,
            state_path,
            debounce: Duration::from_millis(debounce_ms),
            tick_interval: Duration::from_secs(tick_secs),
        })
    }
}

/// Resolves only `WAYPOST_STATE_PATH`, for commands that edit persisted
/// state without tracking a game version.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] when the default path is needed
/// but the home directory cannot be determined.
pub fn state_path_from_env() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var("WAYPOST_STATE_PATH") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(state_path_in(base_dirs.home_dir()))
}

fn state_path_in(home_dir: &Path) -> PathBuf {
    env::var("WAYPOST_STATE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir.join(DEFAULT_STATE_DIR).join(STATE_FILE_NAME))
}

fn required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Reads an optional integer variable constrained to `min..=max`.
fn parse_u64(key: &str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    let Ok(val) = env::var(key) else {
        return Ok(default);
    };

    let parsed = val
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected positive integer, got '{val}'"),
        })?;

    if parsed < min || parsed > max {
        let message = if max == u64::MAX {
            format!("must be at least {min}, got {parsed}")
        } else {
            format!("must be between {min} and {max}, got {parsed}")
        };
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        });
    }

    Ok(parsed)
}
