//! # Configuration Module
//!
//! Platform data locations and the tunables of a flow run.
//!
//! ## Data Storage
//!
//! The library cache lives in the platform-standard data directory:
//! - Linux: `~/.local/share/playflow/library.db`
//! - macOS: `~/Library/Application Support/playflow/library.db`
//! - Windows: `%APPDATA%\playflow\library.db`
//!
//! ## Settings
//!
//! [`FlowSettings`] are read from `settings.json` in the platform config
//! directory (`~/.config/playflow/` on Linux). Every field is optional in the
//! file. Environment variables override the file:
//!
//! | variable | field |
//! |---|---|
//! | `PLAYLIST_FLOW_ENABLED` | `enabled` |
//! | `PLAYLIST_FLOW_SKIP_CYCLES` | `skip_cycles` |
//! | `PLAYLIST_FLOW_TIMEOUT_SECS` | `overall_timeout_secs` |
//! | `PLAYLIST_FLOW_BATCH_TIMEOUT_SECS` | `batch_timeout_secs` |
//!
//! Boolean variables are true only when set to `true` (any case).

use crate::executor::{
    FlowConfig, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT, DEFAULT_OVERALL_TIMEOUT,
    DEFAULT_WRITE_CHUNK_SIZE,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENABLED: &str = "PLAYLIST_FLOW_ENABLED";
pub const ENV_SKIP_CYCLES: &str = "PLAYLIST_FLOW_SKIP_CYCLES";
pub const ENV_TIMEOUT_SECS: &str = "PLAYLIST_FLOW_TIMEOUT_SECS";
pub const ENV_BATCH_TIMEOUT_SECS: &str = "PLAYLIST_FLOW_BATCH_TIMEOUT_SECS";

const APP_DIR: &str = "playflow";

/// Returns the playflow data directory, creating it if needed.
///
/// # Errors
///
/// Fails when the platform has no data directory or the directory cannot be
/// created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create playflow data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default library cache path, `library.db` in the data directory.
pub fn get_library_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("library.db"))
}

/// Returns where [`FlowSettings`] are read from. The file need not exist.
pub fn get_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory."))?;
    Ok(config_dir.join(APP_DIR).join("settings.json"))
}

/// Tunables of a flow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    pub enabled: bool,
    pub skip_cycles: bool,
    pub overall_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub batch_size: usize,
    pub write_chunk_size: usize,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_cycles: true,
            overall_timeout_secs: DEFAULT_OVERALL_TIMEOUT.as_secs(),
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT.as_secs(),
            batch_size: DEFAULT_BATCH_SIZE,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
        }
    }
}

impl FlowSettings {
    /// Settings file (if any) plus environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::from_file(&get_settings_path()?)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Reads settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Applies overrides looked up by variable name. Unparsable numbers are
    /// ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ENABLED) {
            self.enabled = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_SKIP_CYCLES) {
            self.skip_cycles = parse_flag(&value);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).and_then(|v| parse_secs(ENV_TIMEOUT_SECS, &v)) {
            self.overall_timeout_secs = secs;
        }
        if let Some(secs) =
            lookup(ENV_BATCH_TIMEOUT_SECS).and_then(|v| parse_secs(ENV_BATCH_TIMEOUT_SECS, &v))
        {
            self.batch_timeout_secs = secs;
        }
    }

    pub fn to_flow_config(&self) -> FlowConfig {
        FlowConfig {
            overall_timeout: Duration::from_secs(self.overall_timeout_secs),
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            batch_size: self.batch_size,
            write_chunk_size: self.write_chunk_size,
            skip_cycles: self.skip_cycles,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_secs(key: &str, value: &str) -> Option<u64> {
    match value.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!("Ignoring {key}={value:?}: not a whole number of seconds");
            None
        }
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the library cache
    pub library_path: PathBuf,
}

impl RuntimeConfig {
    pub fn new() -> Result<Self> {
        Ok(Self {
            library_path: get_library_path()?,
        })
    }

    pub fn with_library_path(library_path: PathBuf) -> Self {
        Self { library_path }
    }

    /// Uses `explicit` when given, the default location otherwise.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self::with_library_path(path)),
            None => Self::new(),
        }
    }
}
