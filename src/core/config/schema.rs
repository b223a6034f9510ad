//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! 1. `$FORKMERGE_CONFIG` if set
//! 2. `forkmerge.toml` in the working directory
//!
//! # Validation
//!
//! Values are validated after parsing: sizes must be non-zero and at most
//! [`MAX_IMAGE_MIB`], and the version cutoff must be a positive release
//! number.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest image size accepted, in MiB. Classic HFS volumes stop at 2 GiB.
pub const MAX_IMAGE_MIB: u64 = 2048;

/// Fixture build configuration.
///
/// Every field is optional; [`super::Config`] supplies the defaults.
///
/// # Example
///
/// ```toml
/// sample_systems = "SampleSystems"
/// test_bed = "TestBed"
/// output = "TestImages.tmp"
/// blank_image_mib = 50
/// volume_mib = 10
/// max_version = 810
/// parallel = false
/// event_log = true
/// plan = "plans/hfs_plus.toml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory holding per-version snapshots and System files
    pub sample_systems: Option<PathBuf>,

    /// File tree copied into every staged volume
    pub test_bed: Option<PathBuf>,

    /// Output directory for staged trees and images
    pub output: Option<PathBuf>,

    /// Size of the blank filler image in MiB
    pub blank_image_mib: Option<u64>,

    /// Size of each built volume in MiB
    pub volume_mib: Option<u64>,

    /// Only versions whose release number is below this are built
    pub max_version: Option<u32>,

    /// Build versions on separate threads
    pub parallel: Option<bool>,

    /// Write executor events as JSON lines
    pub event_log: Option<bool>,

    /// Path to a TOML patch plan replacing the built-in plan
    pub plan: Option<PathBuf>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, mib) in [
            ("blank_image_mib", self.blank_image_mib),
            ("volume_mib", self.volume_mib),
        ] {
            match mib {
                Some(0) => {
                    return Err(ConfigError::InvalidValue(format!(
                        "{name} must be greater than zero"
                    )))
                }
                Some(n) if n > MAX_IMAGE_MIB => {
                    return Err(ConfigError::InvalidValue(format!(
                        "{name} must be at most {MAX_IMAGE_MIB}, got {n}"
                    )))
                }
                _ => {}
            }
        }
        if self.max_version == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_version must be greater than zero".to_string(),
            ));
        }

        for (name, path) in [
            ("sample_systems", &self.sample_systems),
            ("test_bed", &self.test_bed),
            ("output", &self.output),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::InvalidValue(format!("{name} cannot be empty")));
            }
        }

        Ok(())
    }
}
