//! forkmerge - Build patched System-file test fixtures from resource forks
//!
//! forkmerge takes immutable per-release resource fork snapshots of a
//! classic desktop OS, grafts resources from newer releases onto older ones
//! according to a patch plan, and stages the patched System files for
//! packaging into test volumes.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Plans, snapshot cache, executor, canonical order, runner
//! - [`core`] - Domain types, ownership layout, working set, config, paths
//! - [`codec`] - Resource fork encoding seam
//! - [`volume`] - Volume image seam and the blank filler image
//! - [`ui`] - Console output and the build reporter
//!
//! # Correctness Invariants
//!
//! 1. Snapshots are never mutated
//! 2. A working set holds at most one record per (type, id)
//! 3. Output order depends only on the records, never on how they were added
//! 4. A guard whose resources are missing fails its build

pub mod cli;
pub mod codec;
pub mod core;
pub mod engine;
pub mod ui;
pub mod volume;
