//! Per-file import progress persistence
//!
//! A progress entry maps an input file base name to the number of listens from
//! that file already accepted by ListenBrainz. Entries only move forward: the
//! importer reads the stored value, skips that many rows and writes back the new
//! total after each accepted batch.
//!
//! Single writer, single reader. Nothing here locks the backing file; running two
//! importers against the same config at once is unsupported.

use crate::config::{write_toml_config, ImporterConfig};
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable counter per input file
pub trait ProgressStore {
    /// Stored counter for `file_key`, 0 when the file was never recorded
    fn get(&self, file_key: &str) -> u64;

    /// Overwrite the counter for `file_key` and flush it before returning
    fn set(&mut self, file_key: &str, count: u64) -> Result<()>;
}

/// Progress kept in the `[files]` section of the TOML config document
///
/// Every [`ProgressStore::set`] rewrites the whole document, so the credential and
/// the other sections survive the write.
pub struct TomlProgressStore {
    path: PathBuf,
    config: ImporterConfig,
}

impl TomlProgressStore {
    pub fn new(path: impl Into<PathBuf>, config: ImporterConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Load the config document at `path` (defaults if it does not exist yet)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = ImporterConfig::load(&path)?;
        Ok(Self::new(path, config))
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for TomlProgressStore {
    fn get(&self, file_key: &str) -> u64 {
        self.config.files.get(file_key).copied().unwrap_or(0)
    }

    fn set(&mut self, file_key: &str, count: u64) -> Result<()> {
        self.config.files.insert(file_key.to_string(), count);
        write_toml_config(&self.config, &self.path)?;
        debug!(file = file_key, count, "Progress checkpoint written");
        Ok(())
    }
}

/// In-memory store that also remembers every write in order
#[derive(Debug, Default, Clone)]
pub struct MemoryProgressStore {
    entries: HashMap<String, u64>,
    writes: Vec<(String, u64)>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a single entry
    pub fn with_entry(file_key: &str, count: u64) -> Self {
        let mut store = Self::new();
        store.entries.insert(file_key.to_string(), count);
        store
    }

    /// All `set` calls seen so far, oldest first
    pub fn writes(&self) -> &[(String, u64)] {
        &self.writes
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, file_key: &str) -> u64 {
        self.entries.get(file_key).copied().unwrap_or(0)
    }

    fn set(&mut self, file_key: &str, count: u64) -> Result<()> {
        self.entries.insert(file_key.to_string(), count);
        self.writes.push((file_key.to_string(), count));
        Ok(())
    }
}
