//! Service configuration
//!
//! Merges the TOML bootstrap file with command-line/environment overrides.
//! Priority: command line / environment > TOML file > built-in defaults.

use crate::error::Result;
use rcmp_common::config::{LoggingConfig, TomlConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values given on the command line (or their environment fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub music_dir: Option<PathBuf>,
    pub catalog_file: Option<PathBuf>,
    /// Replaces the configured tag filter when non-empty
    pub tags: Vec<String>,
}

/// Effective configuration for one run of the service
#[derive(Debug, Clone)]
pub struct Config {
    pub music_dir: PathBuf,
    pub catalog_file: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub tag_filter: Vec<String>,
    pub volume: u8,
    pub poll_interval: Duration,
    pub libmpv_paths: Vec<PathBuf>,
    pub logging: LoggingConfig,
    /// File the TOML layer came from; `None` means built-in defaults
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load the TOML file (if any) and apply `overrides`
    ///
    /// Runs before tracing is installed and logs nothing; see [`Config::summary`].
    pub fn load(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (toml, source) = TomlConfig::load_from(config_file)?;
        let mut config = Self::from_toml(toml, overrides);
        config.source = source;
        Ok(config)
    }

    /// Apply `overrides` on top of a parsed TOML configuration
    pub fn from_toml(toml: TomlConfig, overrides: ConfigOverrides) -> Self {
        let tag_filter = if overrides.tags.is_empty() {
            toml.tag_filter
        } else {
            overrides.tags
        };

        Self {
            music_dir: overrides.music_dir.unwrap_or(toml.music_dir),
            catalog_file: overrides.catalog_file.unwrap_or(toml.catalog_file),
            bind_address: toml.bind_address,
            port: overrides.port.unwrap_or(toml.port),
            tag_filter,
            volume: toml.volume,
            // A zero timeout would turn the poll loop into a busy spin
            poll_interval: Duration::from_millis(toml.poll_interval_ms.max(10)),
            libmpv_paths: toml.libmpv_paths,
            logging: toml.logging,
            source: None,
        }
    }

    /// One-line description of the effective settings
    pub fn summary(&self) -> String {
        let source = match &self.source {
            Some(path) => path.display().to_string(),
            None => "built-in defaults".to_string(),
        };
        let filter = if self.tag_filter.is_empty() {
            "none".to_string()
        } else {
            self.tag_filter.join(",")
        };
        format!(
            "config={}, music_dir={}, catalog={}, listen={}:{}, tag_filter={}",
            source,
            self.music_dir.display(),
            self.catalog_file.display(),
            self.bind_address,
            self.port,
            filter
        )
    }
}
