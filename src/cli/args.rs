//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::Parser;

/// forkmerge - Build patched System-file test fixtures from resource fork snapshots
#[derive(Parser, Debug)]
#[command(name = "forkmerge")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
DIRECTORIES (relative to the working directory, see forkmerge.toml):
    SampleSystems/     <version>, <version>.idump and <version>.rjson per release
    TestBed/           file tree copied onto every test volume
    TestImages.tmp/    output: Test-Blank.dsk and Test-<version>/ per release

EXAMPLES:
    # Build every release below 8.1
    forkmerge

    # Show each step and guard decision
    forkmerge --debug")]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}
