//! File watcher for the game's progress files.
//!
//! Watches one or more directories recursively (the saves directory, and for
//! legacy versions the lifetime stats directory beside it) and reports
//! changes to `.json` and `.dat` files. The watcher does not read files: a
//! change only means "a tick is due".
//!
//! The notify callback runs on notify's own thread, so it only filters and
//! forwards into a bounded channel with `try_send`; it never blocks.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use waypost_monitor::watcher::{FileWatcher, WatchEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = FileWatcher::new(vec![PathBuf::from("/home/me/.minecraft/saves")], tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("changed: {}", event.path().display());
//!     }
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// File extensions that carry progress data.
pub const WATCHED_EXTENSIONS: [&str; 2] = ["json", "dat"];

/// A relevant change in a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A progress file was created or written.
    Changed(PathBuf),
    /// A progress file (or a whole world) was removed.
    Removed(PathBuf),
}

impl WatchEvent {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Recursive watcher over the progress file directories.
///
/// Dropping it stops the subscription.
#[derive(Debug)]
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    watch_dirs: Vec<PathBuf>,
}

impl FileWatcher {
    /// Starts watching every directory in `watch_dirs`.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory does not exist or the watcher cannot
    /// be initialized.
    pub fn new(watch_dirs: Vec<PathBuf>, event_sender: mpsc::Sender<WatchEvent>) -> Result<Self> {
        if let Some(missing) = watch_dirs.iter().find(|d| !d.is_dir()) {
            return Err(WatcherError::DirectoryNotFound(missing.clone()));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &event_sender);
            },
            Config::default(),
        )?;

        for dir in &watch_dirs {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            debug!(watch_dir = %dir.display(), "Started recursive file watch");
        }

        info!(dirs = watch_dirs.len(), "Initialized file watcher");

        Ok(Self {
            _watcher: watcher,
            watch_dirs,
        })
    }

    #[must_use]
    pub fn watch_dirs(&self) -> &[PathBuf] {
        &self.watch_dirs
    }
}

/// Returns `true` for files whose changes should trigger a tick.
///
/// Temporary files written next to the real ones are ignored.
#[must_use]
pub fn is_progress_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext))
}

/// Maps a notify event to watch events.
fn classify(event: &Event) -> Vec<WatchEvent> {
    let make: fn(PathBuf) -> WatchEvent = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => WatchEvent::Changed,
        EventKind::Remove(_) => WatchEvent::Removed,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        // Removing a world directory carries no extension but still changes the active world.
        .filter(|p| is_progress_file(p) || matches!(event.kind, EventKind::Remove(_)))
        .cloned()
        .map(make)
        .collect()
}

fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    sender: &mpsc::Sender<WatchEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for watch_event in classify(&event) {
        if let Err(e) = sender.try_send(watch_event) {
            warn!(error = %e, "Dropping watch event, channel full or closed");
        }
    }
}
