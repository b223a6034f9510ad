//! engine::exec
//!
//! The plan executor.
//!
//! # Architecture
//!
//! The Executor is the only component that mutates a [`WorkingSet`]. It
//! loads the base snapshot, copies it into a fresh set, and applies the
//! plan's steps strictly in order.
//!
//! # Executor Contract
//!
//! The executor MUST:
//! 1. Read every copied or scanned resource from a cached snapshot, never
//!    from the working set
//! 2. Apply steps in plan order so that later copies of a key win
//! 3. Fail closed on guards whose resources are missing
//! 4. On the first error, stop and return no working set at all
//! 5. Report progress only through the [`EventSink`]
//!
//! # Example
//!
//! ```
//! use forkmerge::core::types::{ResType, ResourceKey, ResourceRecord, VersionLabel};
//! use forkmerge::engine::events::NullSink;
//! use forkmerge::engine::exec::Executor;
//! use forkmerge::engine::plan::{Plan, PlanStep, SnapshotRef};
//! use forkmerge::engine::snapshot::{MemorySnapshotProvider, SnapshotCache};
//!
//! let ptch = ResType::new("ptch").unwrap();
//! let base = VersionLabel::new("7.6.1").unwrap();
//! let src = VersionLabel::new("8.1.0").unwrap();
//! let cache = SnapshotCache::new(
//!     MemorySnapshotProvider::new()
//!         .with_snapshot(base.clone(), vec![])
//!         .with_snapshot(src.clone(), vec![
//!             ResourceRecord::new(ResourceKey::new(ptch, 41), vec![0x4e, 0x75]),
//!         ]),
//! );
//!
//! let plan = Plan::new("demo").with_step(PlanStep::copy(SnapshotRef::Version(src), ptch, 41));
//! let set = Executor::new(&cache, &NullSink).execute(&plan, &base).unwrap();
//! assert_eq!(set.len(), 1);
//! ```

use thiserror::Error;

use super::events::{BuildEvent, EventSink, RunId};
use super::guard::{self, GuardError};
use super::plan::{Plan, PlanStep, StepPath};
use super::snapshot::{SnapshotCache, SnapshotError};
use crate::core::types::{ResourceKey, VersionLabel};
use crate::core::working_set::WorkingSet;

/// Errors from execution. Every one aborts the build.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The base snapshot could not be loaded.
    #[error("failed to load base snapshot: {0}")]
    BaseSnapshot(#[source] SnapshotError),

    /// A copied resource is absent from its source snapshot.
    #[error("step {step}: {key} not found in {snapshot}")]
    NotFound {
        step: StepPath,
        snapshot: VersionLabel,
        key: ResourceKey,
    },

    /// A guard could not be evaluated.
    #[error("step {step}: {source}")]
    GuardEvaluation { step: StepPath, source: GuardError },

    /// A source snapshot could not be loaded.
    #[error("step {step}: {source}")]
    Snapshot {
        step: StepPath,
        source: SnapshotError,
    },
}

impl ExecuteError {
    /// The step that failed, if the failure belongs to a step.
    pub fn step(&self) -> Option<&StepPath> {
        match self {
            ExecuteError::BaseSnapshot(_) => None,
            ExecuteError::NotFound { step, .. }
            | ExecuteError::GuardEvaluation { step, .. }
            | ExecuteError::Snapshot { step, .. } => Some(step),
        }
    }
}

/// What one copy step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOutcome {
    /// The copied resource replaced one already in the set.
    pub replaced: bool,
    /// Owned resources copied along with it.
    pub owned: usize,
}

/// The executor.
///
/// Borrows a snapshot cache and an event sink; holds no per-build state, so
/// one executor can run many builds, including concurrently.
pub struct Executor<'a> {
    cache: &'a SnapshotCache,
    sink: &'a dyn EventSink,
    run_id: RunId,
}

impl<'a> Executor<'a> {
    /// Create a new executor with a fresh run id.
    pub fn new(cache: &'a SnapshotCache, sink: &'a dyn EventSink) -> Self {
        Self {
            cache,
            sink,
            run_id: RunId::new(),
        }
    }

    /// Use an existing run id (builder pattern).
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// The run id stamped on BuildStarted events.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Build `base` by applying `plan` to a copy of its snapshot.
    ///
    /// # Returns
    ///
    /// The finished working set, or the first error. On error nothing of
    /// the partially patched set escapes.
    pub fn execute(&self, plan: &Plan, base: &VersionLabel) -> Result<WorkingSet, ExecuteError> {
        let version = base.as_str();

        let snapshot = match self.cache.get(base) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = ExecuteError::BaseSnapshot(e);
                self.sink.emit(&BuildEvent::build_failed(version, err.to_string()));
                return Err(err);
            }
        };

        let mut set = WorkingSet::load(&snapshot);
        self.sink.emit(&BuildEvent::build_started(
            &self.run_id,
            version,
            &plan.name,
            plan.digest(),
            set.len(),
        ));

        match self.run_steps(&plan.steps, None, base, &mut set) {
            Ok(()) => {
                self.sink
                    .emit(&BuildEvent::build_completed(version, set.len()));
                Ok(set)
            }
            Err(err) => {
                if let Some(step) = err.step() {
                    self.sink.emit(&BuildEvent::step_failed(
                        version,
                        step.to_string(),
                        err.to_string(),
                    ));
                }
                self.sink.emit(&BuildEvent::build_failed(version, err.to_string()));
                Err(err)
            }
        }
    }

    fn run_steps(
        &self,
        steps: &[PlanStep],
        parent: Option<&StepPath>,
        base: &VersionLabel,
        set: &mut WorkingSet,
    ) -> Result<(), ExecuteError> {
        let version = base.as_str();

        for (i, step) in steps.iter().enumerate() {
            let path = match parent {
                Some(p) => p.child(i),
                None => StepPath::top(i),
            };
            self.sink.emit(&BuildEvent::step_started(
                version,
                path.to_string(),
                step.description(),
            ));

            match step {
                PlanStep::CopyWithOwned {
                    source,
                    res_type,
                    id,
                    ..
                } => {
                    let source = source.resolve(base);
                    let key = ResourceKey::new(*res_type, *id);
                    let outcome = self.copy_with_owned(set, source, key, &path)?;
                    self.sink.emit(&BuildEvent::step_succeeded(
                        version,
                        path.to_string(),
                        source.as_str(),
                        key.to_string(),
                        outcome.replaced,
                        outcome.owned,
                    ));
                }
                PlanStep::Guarded { guard, steps } => {
                    let passed = guard::evaluate(guard, base, self.cache).map_err(|source| {
                        ExecuteError::GuardEvaluation {
                            step: path.clone(),
                            source,
                        }
                    })?;
                    self.sink.emit(&BuildEvent::guard_evaluated(
                        version,
                        path.to_string(),
                        &guard.name,
                        passed,
                    ));

                    if passed {
                        self.run_steps(steps, Some(&path), base, set)?;
                    } else {
                        self.sink.emit(&BuildEvent::guard_skipped(
                            version,
                            path.to_string(),
                            &guard.name,
                            steps.iter().map(PlanStep::count).sum(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Copy `key` and every resource it owns from `source` into `set`.
    ///
    /// The owned-resource scan reads `source` only. Resources copied by the
    /// scan are not scanned for owners themselves.
    ///
    /// # Errors
    ///
    /// Returns `ExecuteError::NotFound` if `source` has no resource `key`.
    /// Finding no owned resources is not an error.
    pub fn copy_with_owned(
        &self,
        set: &mut WorkingSet,
        source: &VersionLabel,
        key: ResourceKey,
        step: &StepPath,
    ) -> Result<CopyOutcome, ExecuteError> {
        let snapshot = self
            .cache
            .get(source)
            .map_err(|source| ExecuteError::Snapshot {
                step: step.clone(),
                source,
            })?;

        let record = snapshot.get(&key).ok_or_else(|| ExecuteError::NotFound {
            step: step.clone(),
            snapshot: source.clone(),
            key,
        })?;
        let replaced = set.upsert(record.clone());

        let mut owned = 0;
        for sub in snapshot.owned_by(&key) {
            set.upsert(sub.clone());
            owned += 1;
        }

        Ok(CopyOutcome { replaced, owned })
    }
}
