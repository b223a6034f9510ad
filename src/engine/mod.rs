//! engine
//!
//! Applies patch plans to base snapshots.
//!
//! # Architecture
//!
//! Each build follows the same lifecycle:
//!
//! ```text
//! Load base -> Run steps (copy / guard) -> Canonical order -> Encode -> Stage
//! ```
//!
//! 1. **Load**: the base snapshot seeds a fresh working set
//! 2. **Run**: plan steps copy resources (with owned children) from other
//!    snapshots, some behind guards that inspect the base
//! 3. **Order**: the working set is emitted sorted by type, then id
//! 4. **Stage**: the [`runner`] writes the result next to a copy of the test bed
//!
//! # Invariants
//!
//! - Snapshots are loaded once per run and never mutated
//! - A working set belongs to exactly one build
//! - The first failing step aborts its build; other builds are unaffected
//! - Guards fail closed: a missing resource is an error, not a pass
//!
//! # Example
//!
//! ```ignore
//! use forkmerge::engine::{builtin, Executor, NullSink, SnapshotCache};
//!
//! let cache = SnapshotCache::new(provider);
//! let set = Executor::new(&cache, &NullSink).execute(&builtin::hfs_plus(), &base)?;
//! let records = canonical_order(set);
//! ```

pub mod builtin;
pub mod canonical;
pub mod events;
pub mod exec;
pub mod guard;
pub mod plan;
pub mod runner;
pub mod snapshot;

// Re-exports for convenience
pub use canonical::canonical_order;
pub use events::{BuildEvent, CollectingSink, EventSink, JsonLinesSink, MultiSink, NullSink, RunId};
pub use exec::{CopyOutcome, ExecuteError, Executor};
pub use guard::GuardError;
pub use plan::{ConditionalGuard, GuardRef, Plan, PlanError, PlanStep, SnapshotRef, StepPath};
pub use runner::{BuildError, RunOptions, RunSummary, Runner, VersionBuild, VersionReport};
pub use snapshot::{
    FileSnapshotProvider, MemorySnapshotProvider, SnapshotCache, SnapshotError, SnapshotProvider,
};
