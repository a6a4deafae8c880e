//! Bootstrap configuration loading
//!
//! The TOML file only carries values needed at startup (music folder, catalog
//! document, HTTP bind address, logging). Everything else is runtime state.
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line `--config`)
//! 2. `RCMP_CONFIG` environment variable
//! 3. `<user config dir>/rcmp/config.toml`
//! 4. Built-in defaults (no file)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RCMP_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder scanned for audio files
    pub music_dir: PathBuf,

    /// JSON document holding the catalog (relative path -> tags)
    pub catalog_file: PathBuf,

    /// HTTP bind address
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Tags selecting the active playlist (empty = every track)
    pub tag_filter: Vec<String>,

    /// Initial volume (0-100)
    pub volume: u8,

    /// Backend event poll timeout in milliseconds
    pub poll_interval_ms: u64,

    /// Candidate locations of the libmpv shared library, tried in order
    pub libmpv_paths: Vec<PathBuf>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            catalog_file: PathBuf::from("info_music.json"),
            bind_address: "0.0.0.0".to_string(),
            port: default_port(),
            tag_filter: Vec::new(),
            volume: 50,
            poll_interval_ms: 100,
            libmpv_paths: default_libmpv_paths(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        if config.volume > 100 {
            return Err(Error::Config(format!(
                "volume must be within 0-100, got {}",
                config.volume
            )));
        }
        Ok(config)
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// `explicit` is the command-line path, if any. An explicit path that does
    /// not exist is treated like any other missing file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_from(explicit)?;
        match source {
            Some(path) => info!("Loaded TOML configuration from {}", path.display()),
            None => warn!("No configuration file found, using built-in defaults"),
        }
        Ok(config)
    }

    /// Like [`TomlConfig::load`], but silent; also returns the file that was
    /// read (`None` when the defaults were used)
    ///
    /// For callers that load configuration before a subscriber is installed.
    pub fn load_from(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let Some(path) = resolve_config_path(explicit).filter(|p| p.exists()) else {
            return Ok((Self::default(), None));
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        Ok((config, Some(path)))
    }
}

/// Determine which configuration file to read, if any
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("rcmp").join("config.toml"))
        .filter(|p| p.exists())
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent default music folder
pub fn default_music_dir() -> PathBuf {
    dirs::audio_dir().unwrap_or_else(|| PathBuf::from("./music"))
}

fn default_libmpv_paths() -> Vec<PathBuf> {
    [
        "/data/data/com.termux/files/usr/lib/libmpv.so",
        "/lib/arm-linux-gnueabihf/libmpv.so",
        "libmpv.so.2",
        "libmpv.so.1",
        "libmpv.so",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}
