//! engine::snapshot
//!
//! Snapshot loading and memoization.
//!
//! # Architecture
//!
//! A [`SnapshotProvider`] turns a version label into decoded records. The
//! [`SnapshotCache`] wraps a provider and loads each label at most once per
//! run, handing out shared [`Arc<Snapshot>`]s. The cache is passed to the
//! executor explicitly; nothing is global.
//!
//! # Invariants
//!
//! - A cached snapshot is never replaced or mutated
//! - Failed loads are not cached; the error is returned to the caller
//! - Concurrent builds may share one cache

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::codec::{CodecError, ResourceCodec};
use crate::core::paths::with_suffix;
use crate::core::snapshot::Snapshot;
use crate::core::types::{ResourceRecord, VersionLabel};

/// Errors from loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot exists for the label.
    #[error("no snapshot for version {label}")]
    Missing {
        /// Requested label.
        label: VersionLabel,
    },

    /// The snapshot file could not be read.
    #[error("failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot could not be decoded.
    #[error("failed to decode snapshot {label}: {source}")]
    Decode {
        label: VersionLabel,
        source: CodecError,
    },
}

/// Source of decoded resource forks, keyed by version label.
pub trait SnapshotProvider: Send + Sync {
    /// Load the records of one version, in stored order.
    fn load(&self, label: &VersionLabel) -> Result<Vec<ResourceRecord>, SnapshotError>;
}

/// Reads `<dir>/<label>.<ext>` through a codec, where the codec names `ext`.
pub struct FileSnapshotProvider<C> {
    dir: PathBuf,
    codec: C,
}

impl<C: ResourceCodec> FileSnapshotProvider<C> {
    /// Create a provider for snapshots stored in `dir`.
    pub fn new(dir: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            dir: dir.into(),
            codec,
        }
    }

    fn path_for(&self, label: &VersionLabel) -> PathBuf {
        with_suffix(&self.dir.join(label.as_str()), self.codec.extension())
    }
}

impl<C: ResourceCodec> SnapshotProvider for FileSnapshotProvider<C> {
    fn load(&self, label: &VersionLabel) -> Result<Vec<ResourceRecord>, SnapshotError> {
        let path = self.path_for(label);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::Missing {
                    label: label.clone(),
                }
            } else {
                SnapshotError::Read {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        self.codec
            .decode(&bytes)
            .map_err(|source| SnapshotError::Decode {
                label: label.clone(),
                source,
            })
    }
}

/// In-memory provider with fixed contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotProvider {
    snapshots: HashMap<VersionLabel, Vec<ResourceRecord>>,
}

impl MemorySnapshotProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a version's records (builder pattern).
    pub fn with_snapshot(mut self, label: VersionLabel, records: Vec<ResourceRecord>) -> Self {
        self.snapshots.insert(label, records);
        self
    }
}

impl SnapshotProvider for MemorySnapshotProvider {
    fn load(&self, label: &VersionLabel) -> Result<Vec<ResourceRecord>, SnapshotError> {
        self.snapshots
            .get(label)
            .cloned()
            .ok_or_else(|| SnapshotError::Missing {
                label: label.clone(),
            })
    }
}

/// Run-lifetime memo of loaded snapshots.
pub struct SnapshotCache {
    provider: Box<dyn SnapshotProvider>,
    loaded: RwLock<HashMap<VersionLabel, Arc<Snapshot>>>,
}

impl SnapshotCache {
    /// Create an empty cache over `provider`.
    pub fn new(provider: impl SnapshotProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Get a snapshot, loading it on first use.
    ///
    /// If two threads race to load the same label, both load it and the
    /// first insertion is kept; every caller sees that one instance.
    ///
    /// # Errors
    ///
    /// Returns the provider's error. Nothing is cached on failure.
    pub fn get(&self, label: &VersionLabel) -> Result<Arc<Snapshot>, SnapshotError> {
        if let Some(snapshot) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
        {
            return Ok(Arc::clone(snapshot));
        }

        let records = self.provider.load(label)?;
        let snapshot = Arc::new(Snapshot::new(label.clone(), records));

        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(loaded.entry(label.clone()).or_insert(snapshot)))
    }

    /// Check whether a label has been loaded.
    pub fn is_loaded(&self, label: &VersionLabel) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(label)
    }

    /// Number of loaded snapshots.
    pub fn len(&self) -> usize {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("loaded", &self.len())
            .finish_non_exhaustive()
    }
}
