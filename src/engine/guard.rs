//! engine::guard
//!
//! Conditional guard evaluation.
//!
//! A guard passes when its byte pattern is absent from every referenced
//! resource. Evaluation fails closed: a referenced resource that does not
//! exist is an error, never a pass.

use thiserror::Error;

use super::plan::ConditionalGuard;
use super::snapshot::{SnapshotCache, SnapshotError};
use crate::core::types::{ResourceKey, VersionLabel};

/// Errors from guard evaluation.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A referenced resource is missing from its snapshot.
    #[error("guard '{guard}' needs {key} from {snapshot}, which does not have it")]
    MissingResource {
        guard: String,
        snapshot: VersionLabel,
        key: ResourceKey,
    },

    /// A referenced snapshot could not be loaded.
    #[error("guard '{guard}' could not load its snapshot: {source}")]
    Snapshot {
        guard: String,
        source: SnapshotError,
    },
}

/// Evaluate `guard` for a build of `base`.
///
/// Every reference is resolved before any payload is searched, so a missing
/// resource is reported even if an earlier payload already contains the
/// pattern.
///
/// # Errors
///
/// Returns `GuardError` if any referenced snapshot or resource is missing.
pub fn evaluate(
    guard: &ConditionalGuard,
    base: &VersionLabel,
    cache: &SnapshotCache,
) -> Result<bool, GuardError> {
    let mut hits = Vec::with_capacity(guard.refs.len());

    for r in &guard.refs {
        let label = r.snapshot.resolve(base);
        let snapshot = cache.get(label).map_err(|source| GuardError::Snapshot {
            guard: guard.name.clone(),
            source,
        })?;
        let key = r.key();
        let record = snapshot
            .get(&key)
            .ok_or_else(|| GuardError::MissingResource {
                guard: guard.name.clone(),
                snapshot: label.clone(),
                key,
            })?;
        hits.push(record.data_contains(&guard.pattern));
    }

    Ok(!hits.contains(&true))
}
