//! Utility modules for the Waypost monitor.
//!
//! # Modules
//!
//! - [`debounce`]: Coalescing bursts of progress file changes

pub mod debounce;

pub use debounce::{Debouncer, DebouncerError};
