//! Configuration loading and atomic write-back
//!
//! The importer keeps a single TOML document next to the user:
//!
//! ```toml
//! [brainz]
//! auth_token = "..."
//!
//! [files]
//! "deezer-listeningHistory.csv" = 4
//! ```
//!
//! `[brainz]` carries the service credential, `[files]` holds one processed-listen
//! counter per imported file name. Every write rewrites the whole document.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file looked up in the working directory when nothing else is given
pub const DEFAULT_CONFIG_FILE: &str = "deezer_importer.toml";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "LBI_CONFIG";

/// ListenBrainz production API root
pub const DEFAULT_API_URL: &str = "https://api.listenbrainz.org";

/// Largest number of listens ListenBrainz accepts in one submission
pub const MAX_LISTENS_PER_REQUEST: usize = 1000;

/// Whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// ListenBrainz credential and endpoint
    #[serde(default)]
    pub brainz: BrainzConfig,

    /// Import tuning
    #[serde(default)]
    pub import: ImportConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Processed-listen counters keyed by input file base name
    #[serde(default)]
    pub files: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrainzConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// API root, defaults to [`DEFAULT_API_URL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "error".to_string()
}

impl ImporterConfig {
    /// Load the configuration document from `path`
    ///
    /// A missing file is not an error: the defaults are returned (empty `[files]`,
    /// no token) and the first progress write creates the file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config: ImporterConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

        debug!(
            path = %path.display(),
            files = config.files.len(),
            "Loaded importer configuration"
        );
        Ok(config)
    }

    /// Auth token, rejecting missing or blank values
    pub fn auth_token(&self) -> Result<&str> {
        match self.brainz.auth_token.as_deref() {
            Some(token) if is_valid_token(token) => Ok(token.trim()),
            _ => Err(Error::MissingToken("[brainz] auth_token".to_string())),
        }
    }

    pub fn api_url(&self) -> &str {
        self.brainz
            .api_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_API_URL)
    }

    /// Configured batch size clamped to `1..=MAX_LISTENS_PER_REQUEST`
    pub fn max_batch_size(&self) -> usize {
        match self.import.max_batch_size {
            Some(size) => size.clamp(1, MAX_LISTENS_PER_REQUEST),
            None => MAX_LISTENS_PER_REQUEST,
        }
    }
}

/// Validate auth token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Resolve the config file location
///
/// **Priority:**
/// 1. Command-line argument
/// 2. `LBI_CONFIG` environment variable
/// 3. `deezer_importer.toml` in the working directory
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Write the configuration atomically
///
/// Serializes to `<target>.tmp`, syncs it to disk and renames it over the target,
/// so a crash leaves either the old or the new document. On Unix the file is
/// created with mode 0600 since it carries the auth token.
pub fn write_toml_config(config: &ImporterConfig, target: &Path) -> Result<()> {
    let content = toml::to_string(config)?;

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = open_private(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }
    sync_parent_dir(target)?;

    debug!(path = %target.display(), "Configuration written");
    Ok(())
}

#[cfg(unix)]
fn open_private(path: &Path) -> Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; a stale temp file keeps its old bits
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<fs::File> {
    Ok(fs::File::create(path)?)
}

/// Directory holding `path`; a bare file name lives in the working directory
#[cfg_attr(not(unix), allow(dead_code))]
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Flush the rename itself to disk
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    fs::File::open(parent_dir(path))?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// True when group or other permission bits are set on the config file
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}
