//! # CLI Command Implementations
//!
//! Each subcommand of `stagewright` lives in its own file with:
//! - An `Args` struct deriving `clap::Args` for its options.
//! - An `execute` function that loads the configuration and calls into the
//!   `stagewright` library.
//!
//! Commands that read a configuration file share the [`ConfigArg`] option
//! and the [`load_config`] helper.

pub mod compile;
pub mod completions;
pub mod expand;
pub mod graph;
pub mod validate;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use stagewright::config::{self, Config};
use stagewright::defaults::DEFAULT_CONFIG_FILE;

/// Location of the configuration document.
#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to the configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "STAGEWRIGHT_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,
}

/// Reads, parses and validates the configuration file.
pub fn load_config(arg: &ConfigArg) -> Result<Config> {
    let config = config::from_file(&arg.config)
        .with_context(|| format!("Failed to load config from {}", arg.config.display()))?;
    config::validation::validate(&config)
        .with_context(|| format!("Invalid configuration in {}", arg.config.display()))?;
    Ok(config)
}
