//! engine::runner
//!
//! Runs the patch plan once per discovered base version.
//!
//! # Architecture
//!
//! ```text
//! Blank image -> Discover versions -> for each: Execute -> Order -> Encode -> Stage -> Volume
//! ```
//!
//! A version's staging directory is only touched after its plan has
//! executed successfully, so a failed build never leaves a half-patched
//! System behind.
//!
//! # Invariants
//!
//! - Builds are isolated: one version's failure never affects another's
//! - Builds share only the read-only snapshot cache and the event sink
//! - Setup failures (output directory, blank image, discovery) abort the run
//!
//! # Example
//!
//! ```ignore
//! use forkmerge::engine::runner::{Runner, RunOptions};
//!
//! let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &sink)
//!     .with_options(RunOptions::from_config(&config))
//!     .run()?;
//! if !summary.is_success() {
//!     std::process::exit(1);
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::canonical::{self, canonical_order};
use super::events::{EventSink, RunId};
use super::exec::{ExecuteError, Executor};
use super::plan::Plan;
use super::snapshot::{SnapshotCache, SnapshotError};
use crate::codec::{CodecError, ResourceCodec};
use crate::core::config::Config;
use crate::core::paths::{with_suffix, FixturePaths, INFO_EXT};
use crate::core::types::VersionLabel;
use crate::volume::{write_blank_image, VolumeBuilder, VolumeError, VolumeRequest, FIXED_FILE_DATE};

/// Errors from running builds.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The plan could not be applied.
    #[error("System {version}: {source}")]
    Execute {
        version: VersionLabel,
        source: ExecuteError,
    },

    /// The patched fork could not be encoded.
    #[error("System {version}: failed to encode resource fork: {source}")]
    Encode {
        version: VersionLabel,
        source: CodecError,
    },

    /// A filesystem operation failed.
    #[error("failed to {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Image output failed.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// A build thread panicked.
    #[error("System {version}: build thread panicked")]
    Panicked { version: VersionLabel },
}

impl BuildError {
    fn io<'a>(
        action: &'static str,
        path: &'a Path,
    ) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| BuildError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Knobs taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Size of the blank filler image in bytes.
    pub blank_image_bytes: u64,
    /// Size of each volume image in bytes.
    pub volume_bytes: u64,
    /// Only releases numbered below this are built.
    pub max_version: u32,
    /// Build versions on separate threads.
    pub parallel: bool,
}

impl RunOptions {
    /// Take options from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            blank_image_bytes: config.blank_image_bytes(),
            volume_bytes: config.volume_bytes(),
            max_version: config.max_version(),
            parallel: config.parallel(),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one successful version build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBuild {
    /// Number of resources in the patched System.
    pub records: usize,
    /// Digest of the canonical record sequence.
    pub digest: String,
    /// The encoded resource fork that was written.
    pub resource_fork: PathBuf,
    /// The volume image, if a builder was configured.
    pub image: Option<PathBuf>,
}

/// Outcome for one version.
#[derive(Debug)]
pub struct VersionReport {
    pub version: VersionLabel,
    pub result: Result<VersionBuild, BuildError>,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Source snapshots named by the plan that could not be loaded.
    pub unavailable_sources: Vec<(VersionLabel, SnapshotError)>,
    /// One report per discovered version, in version order.
    pub reports: Vec<VersionReport>,
}

impl RunSummary {
    /// Versions that built.
    pub fn succeeded(&self) -> impl Iterator<Item = &VersionReport> {
        self.reports.iter().filter(|r| r.result.is_ok())
    }

    /// Versions that failed.
    pub fn failed(&self) -> impl Iterator<Item = &VersionReport> {
        self.reports.iter().filter(|r| r.result.is_err())
    }

    /// Check whether every version built.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// List the `D.D.D` release entries of `dir` numbered below `max_version`.
///
/// Other entries (snapshot files, sidecars, non-release labels such as
/// `DT_8.1_PPC`) are ignored. The result is sorted.
///
/// # Errors
///
/// Returns `BuildError::Io` if the directory cannot be read.
pub fn discover_versions(dir: &Path, max_version: u32) -> Result<Vec<VersionLabel>, BuildError> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(dir).map_err(BuildError::io("read directory", dir))? {
        let entry = entry.map_err(BuildError::io("read directory", dir))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Ok(label) = VersionLabel::new(name) else {
            continue;
        };
        if label.release_number().is_some_and(|n| n < max_version) {
            versions.push(label);
        }
    }
    versions.sort();
    Ok(versions)
}

/// Recursively copy `from` into `to`, creating `to`.
fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io {
            action: "walk",
            path: from.to_path_buf(),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(BuildError::io("create directory", &target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(BuildError::io("copy", entry.path()))?;
        }
    }
    Ok(())
}

/// Drives one build per version.
pub struct Runner<'a> {
    paths: &'a FixturePaths,
    plan: &'a Plan,
    cache: &'a SnapshotCache,
    codec: &'a dyn ResourceCodec,
    sink: &'a dyn EventSink,
    volume: Option<&'a dyn VolumeBuilder>,
    options: RunOptions,
    run_id: RunId,
}

impl<'a> Runner<'a> {
    /// Create a runner with default options and no volume builder.
    pub fn new(
        paths: &'a FixturePaths,
        plan: &'a Plan,
        cache: &'a SnapshotCache,
        codec: &'a dyn ResourceCodec,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            paths,
            plan,
            cache,
            codec,
            sink,
            volume: None,
            options: RunOptions::default(),
            run_id: RunId::new(),
        }
    }

    /// Set run options (builder pattern).
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Write volume images with `builder` (builder pattern).
    pub fn with_volume_builder(mut self, builder: &'a dyn VolumeBuilder) -> Self {
        self.volume = Some(builder);
        self
    }

    /// This run's id.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Write the blank image, discover versions and build each one.
    ///
    /// # Errors
    ///
    /// Returns an error only for setup failures. Per-version failures are
    /// recorded in the summary.
    pub fn run(&self) -> Result<RunSummary, BuildError> {
        let output = &self.paths.output;
        fs::create_dir_all(output).map_err(BuildError::io("create directory", output))?;
        write_blank_image(&self.paths.blank_image(), self.options.blank_image_bytes)?;

        let versions = discover_versions(&self.paths.sample_systems, self.options.max_version)?;
        let unavailable_sources = if versions.is_empty() {
            Vec::new()
        } else {
            self.preload_sources()
        };
        let reports = if self.options.parallel {
            self.build_parallel(&versions)
        } else {
            versions
                .iter()
                .map(|v| VersionReport {
                    version: v.clone(),
                    result: self.build_version(v),
                })
                .collect()
        };

        Ok(RunSummary {
            run_id: self.run_id.clone(),
            unavailable_sources,
            reports,
        })
    }

    /// Load every source snapshot the plan names into the cache.
    ///
    /// Returns the ones that failed. Builds that read them fail on their
    /// own; the others proceed.
    pub fn preload_sources(&self) -> Vec<(VersionLabel, SnapshotError)> {
        self.plan
            .source_versions()
            .into_iter()
            .filter_map(|label| self.cache.get(&label).err().map(|e| (label, e)))
            .collect()
    }

    fn build_parallel(&self, versions: &[VersionLabel]) -> Vec<VersionReport> {
        std::thread::scope(|s| {
            let handles: Vec<_> = versions
                .iter()
                .map(|v| (v, s.spawn(move || self.build_version(v))))
                .collect();

            handles
                .into_iter()
                .map(|(v, handle)| VersionReport {
                    version: v.clone(),
                    result: handle.join().unwrap_or_else(|_| {
                        Err(BuildError::Panicked { version: v.clone() })
                    }),
                })
                .collect()
        })
    }

    /// Build one version end to end.
    ///
    /// # Errors
    ///
    /// Returns the first failure. If execution fails, nothing is written.
    pub fn build_version(&self, version: &VersionLabel) -> Result<VersionBuild, BuildError> {
        let set = Executor::new(self.cache, self.sink)
            .with_run_id(self.run_id.clone())
            .execute(self.plan, version)
            .map_err(|source| BuildError::Execute {
                version: version.clone(),
                source,
            })?;

        let records = canonical_order(set);
        let digest = canonical::digest(&records);
        let encoded = self
            .codec
            .encode(&records)
            .map_err(|source| BuildError::Encode {
                version: version.clone(),
                source,
            })?;

        let system = self.stage(version)?;
        let resource_fork = with_suffix(&system, self.codec.extension());
        fs::write(&resource_fork, encoded).map_err(BuildError::io("write", &resource_fork))?;

        let image = match self.volume {
            Some(builder) => {
                let dest = self.paths.disk_image(version);
                builder.build(&VolumeRequest {
                    name: FixturePaths::volume_name(version),
                    tree: self.paths.stage_dir(version),
                    size_bytes: self.options.volume_bytes,
                    file_date: FIXED_FILE_DATE,
                    dest: dest.clone(),
                })?;
                Some(dest)
            }
            None => None,
        };

        Ok(VersionBuild {
            records: records.len(),
            digest,
            resource_fork,
            image,
        })
    }

    /// Recreate the staging tree and copy in the base System file.
    ///
    /// Returns the staged System path.
    fn stage(&self, version: &VersionLabel) -> Result<PathBuf, BuildError> {
        let stage = self.paths.stage_dir(version);
        match fs::remove_dir_all(&stage) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BuildError::Io {
                    action: "remove",
                    path: stage,
                    source: e,
                })
            }
        }
        copy_tree(&self.paths.test_bed, &stage)?;

        let system = self.paths.staged_system(version);
        if let Some(parent) = system.parent() {
            fs::create_dir_all(parent).map_err(BuildError::io("create directory", parent))?;
        }

        let source = self.paths.system_file(version);
        fs::copy(&source, &system).map_err(BuildError::io("copy", &source))?;

        let info = with_suffix(&source, INFO_EXT);
        if info.exists() {
            fs::copy(&info, with_suffix(&system, INFO_EXT)).map_err(BuildError::io("copy", &info))?;
        }

        Ok(system)
    }
}
