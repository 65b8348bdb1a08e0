//! # Stagewright CLI
//!
//! This is the binary entry point for the `stagewright` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initializing logging from `--log-level` or `RUST_LOG`.
//! - Executing the selected command and reporting its errors.
//!
//! Parsing, validation, expansion and compilation all live in the library
//! crate, so the binary stays a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
