//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting, verbosity and the console build reporter
//!
//! # Design
//!
//! All console output goes through this module so that `--quiet` and
//! `--debug` are honored in one place.

pub mod output;
