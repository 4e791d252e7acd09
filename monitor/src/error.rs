//! Error types for the Waypost monitor.
//!
//! Each concern owns its error enum; [`MonitorError`] gathers them for
//! callers that drive the whole tracker.

use thiserror::Error;

use crate::config::ConfigError;
use crate::settings::SettingsError;
use crate::sources::SnapshotError;
use crate::template::TemplateError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
///
/// # Examples
///
/// ```
/// use waypost_monitor::error::{MonitorError, Result};
///
/// fn read(path: &str) -> Result<String> {
///     Ok(std::fs::read_to_string(path)?)
/// }
///
/// assert!(matches!(read("/definitely/not/here"), Err(MonitorError::Io(_))));
/// ```
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The completion template could not be loaded.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The persisted state store could not be read or written.
    #[error("state error: {0}")]
    Settings(#[from] SettingsError),

    /// A progress snapshot could not be read.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
