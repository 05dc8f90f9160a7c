//! Configuration loading
//!
//! Bootstrap settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (handled alongside the CLI flag)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the service starts with defaults.

use crate::store::Backend;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Survey service configuration (TOML file contents)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Interface to bind
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Trial catalog CSV
    pub catalog_path: PathBuf,
    /// Where progress snapshots, exports or the row database live
    pub results_dir: PathBuf,
    /// Persistence backend
    pub backend: Backend,
    /// Root directory the catalog's audio paths are relative to
    pub audio_root: PathBuf,
    /// Number of trials each participant answers
    pub total_trials: usize,
    /// Page title shown to participants
    pub study_title: String,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5790,
            catalog_path: PathBuf::from("trials.csv"),
            results_dir: PathBuf::from("results"),
            backend: Backend::Local,
            audio_root: PathBuf::from("audio"),
            total_trials: 50,
            study_title: "Accent Similarity Study".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub catalog_path: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub audio_root: Option<PathBuf>,
    pub total_trials: Option<usize>,
}

impl SurveyConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load the config file if one is found, otherwise defaults
    ///
    /// Returns the path actually read, if any. An explicitly named file that
    /// does not exist or does not parse is an error; a missing file at the
    /// default location is not.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        match default_config_path() {
            Some(path) if path.exists() => Ok((Self::from_file(&path)?, Some(path))),
            _ => Ok((Self::default(), None)),
        }
    }

    /// Apply command-line/environment values on top of file values
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.catalog_path {
            self.catalog_path = path;
        }
        if let Some(dir) = overrides.results_dir {
            self.results_dir = dir;
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(root) = overrides.audio_root {
            self.audio_root = root;
        }
        if let Some(total) = overrides.total_trials {
            self.total_trials = total;
        }
        self
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.total_trials == 0 {
            return Err(Error::Config("total_trials must be at least 1".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// `host:port` bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-user config location: `<config dir>/amos/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("amos").join("config.toml"))
}
