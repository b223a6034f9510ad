//! cli
//!
//! Command-line interface layer for forkmerge.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and wire the engine together
//! - Report the run summary and choose the exit status
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and hands the work
//! to [`crate::engine::runner`]. Console output goes through
//! [`crate::ui::output`].

pub mod args;
pub mod build;

pub use args::Cli;

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::ui::output::Verbosity;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    let root = std::env::current_dir().context("failed to determine working directory")?;
    build::build(&root, verbosity)
}
