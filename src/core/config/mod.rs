//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The build entry point takes no arguments. Everything it needs follows a
//! fixed directory convention; an optional `forkmerge.toml` may adjust the
//! convention and a few sizes.
//!
//! # Precedence
//!
//! 1. Default values
//! 2. Config file
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$FORKMERGE_CONFIG` if set
//! 2. `<root>/forkmerge.toml`
//!
//! # Example
//!
//! ```no_run
//! use forkmerge::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new(".")).unwrap();
//! println!("Volume size: {} bytes", config.volume_bytes());
//! println!("Parallel: {}", config.parallel());
//! ```

pub mod schema;

pub use schema::FileConfig;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the root directory.
pub const CONFIG_FILE_NAME: &str = "forkmerge.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FORKMERGE_CONFIG";

const MIB: u64 = 1024 * 1024;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values read from the config file (all defaults if none was found)
    pub file: FileConfig,
    /// Path the config was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration for a build rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. A missing config file is not an error.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let candidate = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => root.join(CONFIG_FILE_NAME),
        };

        if !candidate.exists() {
            return Ok(Self::default());
        }

        let file = Self::read_file_config(&candidate)?;
        file.validate()?;
        Ok(Self {
            file,
            loaded_from: Some(candidate),
        })
    }

    /// Build a config from already-parsed values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the values fail validation.
    pub fn from_file_config(file: FileConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self {
            file,
            loaded_from: None,
        })
    }

    fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Snapshot directory, relative to the root unless absolute.
    ///
    /// Defaults to `SampleSystems`.
    pub fn sample_systems(&self) -> &Path {
        self.file
            .sample_systems
            .as_deref()
            .unwrap_or(Path::new("SampleSystems"))
    }

    /// Test bed directory.
    ///
    /// Defaults to `TestBed`.
    pub fn test_bed(&self) -> &Path {
        self.file.test_bed.as_deref().unwrap_or(Path::new("TestBed"))
    }

    /// Output directory.
    ///
    /// Defaults to `TestImages.tmp`.
    pub fn output(&self) -> &Path {
        self.file
            .output
            .as_deref()
            .unwrap_or(Path::new("TestImages.tmp"))
    }

    /// Size of the blank filler image in bytes.
    ///
    /// Defaults to 50 MiB.
    pub fn blank_image_bytes(&self) -> u64 {
        self.file.blank_image_mib.unwrap_or(50) * MIB
    }

    /// Size of each built volume in bytes.
    ///
    /// Defaults to 10 MiB.
    pub fn volume_bytes(&self) -> u64 {
        self.file.volume_mib.unwrap_or(10) * MIB
    }

    /// Exclusive upper bound on release numbers to build.
    ///
    /// Defaults to 810 (8.1.0 and later already carry the patches).
    pub fn max_version(&self) -> u32 {
        self.file.max_version.unwrap_or(810)
    }

    /// Whether builds run on separate threads.
    ///
    /// Defaults to `false`.
    pub fn parallel(&self) -> bool {
        self.file.parallel.unwrap_or(false)
    }

    /// Whether executor events are written to `events.jsonl`.
    ///
    /// Defaults to `false`.
    pub fn event_log(&self) -> bool {
        self.file.event_log.unwrap_or(false)
    }

    /// Path to a plan file replacing the built-in plan.
    pub fn plan(&self) -> Option<&Path> {
        self.file.plan.as_deref()
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
