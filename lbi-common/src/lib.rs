//! # LBI Common Library
//!
//! Shared code for the ListenBrainz importer:
//! - Configuration document (TOML) and atomic write-back
//! - Per-file import progress persistence
//! - Logging bootstrap
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;
pub mod progress;

pub use error::{Error, Result};
pub use progress::{MemoryProgressStore, ProgressStore, TomlProgressStore};
