//! Waypost Monitor - completion tracking for game progress snapshots.
//!
//! The monitor reads the per-world progress files the game writes
//! (achievements or advancements, statistics, unlocks) and reconciles them
//! against a completion template, producing a per-goal status and an
//! overall completion percentage.
//!
//! # Overview
//!
//! Every tick the [`session::Tracker`] reads the newest snapshots from the
//! active world and hands them to the [`engine::Reconciler`], which updates
//! the [`model::TemplateData`] aggregate in place. The snapshot format
//! depends on the game version, classified into an [`era::Era`].
//!
//! Manual toggles, custom-goal progress and the legacy baseline are kept in
//! a [`settings::StateStore`] and survive restarts.
//!
//! # Modules
//!
//! - [`era`]: Game version parsing and era classification
//! - [`model`]: Template aggregate (categories, criteria, goals, counters)
//! - [`template`]: Completion template loading
//! - [`parser`]: Snapshot document parsing
//! - [`sources`]: Active world discovery and snapshot reading
//! - [`settings`]: Persisted overrides, custom progress and baseline
//! - [`baseline`]: Legacy snapshot baselining
//! - [`trackers`]: Per-source reconciliation passes
//! - [`progress`]: Step counting and the overall percentage
//! - [`engine`]: The per-tick reconciliation pass
//! - [`session`]: A tracking session over one saves directory
//! - [`watcher`]: File system watcher for progress files
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for monitor operations
//! - [`utils`]: Shared utilities (debouncing)

pub mod baseline;
pub mod config;
pub mod engine;
pub mod era;
pub mod error;
pub mod model;
pub mod parser;
pub mod progress;
pub mod session;
pub mod settings;
pub mod sources;
pub mod template;
pub mod trackers;
pub mod utils;
pub mod watcher;

pub use config::Config;
pub use engine::{Reconciler, TickReport};
pub use era::{Era, GameVersion};
pub use error::{MonitorError, Result};
pub use model::TemplateData;
pub use progress::OverallProgress;
pub use session::Tracker;
pub use settings::{CustomValue, JsonStateStore, PersistedState, StateStore};
pub use sources::{SnapshotReader, Snapshots};
pub use utils::{Debouncer, DebouncerError};
pub use watcher::{FileWatcher, WatchEvent, WatcherError};
