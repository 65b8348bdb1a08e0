//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks a
//! configuration file without compiling anything.
//!
//! ## Functionality
//!
//! - **Schema Validation**: Parses the document and reports every field-level
//!   problem at once, one `field: message` line each.
//! - **Cycle Detection**: Checks the `includes` graph and the data dependency
//!   graph (copies, requirements, mounts and bases) of every variant.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;

use stagewright::config::{self, validation};
use stagewright::output::{highlight, marker, Marker, OutputConfig};

use super::ConfigArg;

/// Validate a configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config_path = &args.config.config;
    println!(
        "{} Validating configuration: {}",
        marker(&out, Marker::Info),
        config_path.display()
    );

    let config = match config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Configuration parsing failed: {}", marker(&out, Marker::Error), e);
            return Err(anyhow::anyhow!("Configuration parsing failed: {}", e));
        }
    };
    println!("   Variants: {}", config.variants.len());

    let problems = validation::problems(&config);
    if !problems.is_empty() {
        for problem in problems.iter() {
            println!(
                "{} {}: {}",
                marker(&out, Marker::Error),
                highlight(&out, &problem.field),
                problem.message
            );
        }
        println!(
            "{} Configuration has {} problem(s) that must be fixed",
            marker(&out, Marker::Error),
            problems.len()
        );
        return Err(anyhow::anyhow!("Configuration validation failed"));
    }

    let mut has_cycles = false;
    let includes = config.includes_graph();
    for name in config.variants.keys() {
        let checks = includes
            .get_deps(name)
            .and_then(|_| config.dependency_graph(name).map(|_| ()));
        if let Err(e) = checks {
            println!(
                "{} {}: {}",
                marker(&out, Marker::Error),
                highlight(&out, &format!("variants.{}", name)),
                e
            );
            has_cycles = true;
        }
    }

    if has_cycles {
        return Err(anyhow::anyhow!("Configuration validation failed"));
    }

    println!("{} Configuration is valid", marker(&out, Marker::Ok));
    Ok(())
}
