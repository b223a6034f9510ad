//! core::paths
//!
//! Centralized path routing for fixture inputs and outputs.
//!
//! # Layout
//!
//! Inputs, under the sample-systems directory:
//! - `<version>` - System file data fork
//! - `<version>.idump` - System file type/creator sidecar
//! - `<version>.<ext>` - Encoded resource fork (the snapshot); the codec
//!   picks the extension, `rjson` for the bundled JSON format
//!
//! Outputs, under the output directory:
//! - `Test-Blank.dsk` - Blank filler image
//! - `Test-<version>/` - Staged copy of the test bed
//! - `Test-<version>/System Folder/System[.idump|.<ext>]` - Patched System
//! - `Test-<version>.dsk` - Volume image
//! - `events.jsonl` - Executor event log
//!
//! # Example
//!
//! ```
//! use forkmerge::core::paths::FixturePaths;
//! use forkmerge::core::types::VersionLabel;
//! use std::path::PathBuf;
//!
//! let paths = FixturePaths::new("/work", "SampleSystems", "TestBed", "TestImages.tmp");
//! let v = VersionLabel::new("7.6.1").unwrap();
//!
//! assert_eq!(
//!     paths.system_file(&v),
//!     PathBuf::from("/work/SampleSystems/7.6.1")
//! );
//! assert_eq!(
//!     paths.staged_system(&v),
//!     PathBuf::from("/work/TestImages.tmp/Test-7.6.1/System Folder/System")
//! );
//! ```

use std::path::{Path, PathBuf};

use super::config::Config;
use super::types::VersionLabel;

/// Extension of the type/creator sidecar next to each System file.
pub const INFO_EXT: &str = "idump";

/// Directory layout of one fixture build.
///
/// # Invariants
///
/// - All paths are absolute if `root` is absolute
/// - No code outside this module formats `Test-<version>` names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixturePaths {
    /// Directory holding snapshots and System files.
    pub sample_systems: PathBuf,
    /// File tree template.
    pub test_bed: PathBuf,
    /// Output directory.
    pub output: PathBuf,
}

impl FixturePaths {
    /// Create a layout from a root and three directories relative to it.
    ///
    /// Absolute directories are used as-is.
    pub fn new(
        root: impl AsRef<Path>,
        sample_systems: impl AsRef<Path>,
        test_bed: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Self {
        let root = root.as_ref();
        Self {
            sample_systems: root.join(sample_systems),
            test_bed: root.join(test_bed),
            output: root.join(output),
        }
    }

    /// Create the layout described by `config`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(
            root,
            config.sample_systems(),
            config.test_bed(),
            config.output(),
        )
    }

    /// The sample System file (data fork) for a version.
    pub fn system_file(&self, version: &VersionLabel) -> PathBuf {
        self.sample_systems.join(version.as_str())
    }

    /// The blank filler image.
    pub fn blank_image(&self) -> PathBuf {
        self.output.join("Test-Blank.dsk")
    }

    /// Volume name for a version's image.
    pub fn volume_name(version: &VersionLabel) -> String {
        format!("Test-{}", version)
    }

    /// Staging directory for a version.
    pub fn stage_dir(&self, version: &VersionLabel) -> PathBuf {
        self.output.join(Self::volume_name(version))
    }

    /// Patched System file inside a version's staging directory.
    pub fn staged_system(&self, version: &VersionLabel) -> PathBuf {
        self.stage_dir(version).join("System Folder").join("System")
    }

    /// Volume image for a version.
    pub fn disk_image(&self, version: &VersionLabel) -> PathBuf {
        self.output.join(format!("{}.dsk", Self::volume_name(version)))
    }

    /// Executor event log.
    pub fn event_log(&self) -> PathBuf {
        self.output.join("events.jsonl")
    }
}

/// Append `.<ext>` to a path without replacing any existing extension.
///
/// `7.6.1` becomes `7.6.1.idump`, not `7.6.idump`.
pub fn with_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> FixturePaths {
        FixturePaths::new("/w", "SampleSystems", "TestBed", "TestImages.tmp")
    }

    fn v(label: &str) -> VersionLabel {
        VersionLabel::new(label).unwrap()
    }

    #[test]
    fn input_paths() {
        let p = paths();
        assert_eq!(p.system_file(&v("7.5.3")), PathBuf::from("/w/SampleSystems/7.5.3"));
        assert_eq!(
            p.staged_system(&v("7.5.3")),
            PathBuf::from("/w/TestImages.tmp/Test-7.5.3/System Folder/System")
        );
    }

    #[test]
    fn output_paths() {
        let p = paths();
        assert_eq!(p.blank_image(), PathBuf::from("/w/TestImages.tmp/Test-Blank.dsk"));
        assert_eq!(p.stage_dir(&v("7.6.0")), PathBuf::from("/w/TestImages.tmp/Test-7.6.0"));
        assert_eq!(
            p.disk_image(&v("7.6.0")),
            PathBuf::from("/w/TestImages.tmp/Test-7.6.0.dsk")
        );
        assert_eq!(p.event_log(), PathBuf::from("/w/TestImages.tmp/events.jsonl"));
    }

    #[test]
    fn absolute_dirs_kept() {
        let p = FixturePaths::new("/w", "/abs/systems", "TestBed", "out");
        assert_eq!(p.sample_systems, PathBuf::from("/abs/systems"));
        assert_eq!(p.output, PathBuf::from("/w/out"));
    }

    #[test]
    fn with_suffix_keeps_dots() {
        assert_eq!(
            with_suffix(Path::new("a/7.6.1"), INFO_EXT),
            PathBuf::from("a/7.6.1.idump")
        );
    }

    #[test]
    fn from_config_uses_defaults() {
        let p = FixturePaths::from_config(Path::new("/w"), &Config::default());
        assert_eq!(p, paths());
    }
}
