//! core
//!
//! Core domain types and pure operations for forkmerge.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ResType, ResourceKey, ResourceRecord, VersionLabel
//! - [`ownership`] - Owned-resource id decoding
//! - [`snapshot`] - Immutable per-version resource fork
//! - [`working_set`] - Mutable, deduplicated per-build resource set
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized directory layout
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Nothing here performs I/O except `config` loading
//! - All operations are deterministic

pub mod config;
pub mod ownership;
pub mod paths;
pub mod snapshot;
pub mod types;
pub mod working_set;
