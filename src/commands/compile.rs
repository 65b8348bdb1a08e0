//! # Compile Command Implementation
//!
//! This module implements the `compile` subcommand. It loads and validates
//! the configuration, expands the requested variant and everything it
//! depends on, compiles the result for each requested platform, and prints
//! it either as a multi-stage Dockerfile or as JSON.
//!
//! Platforms are compiled in parallel and share one compiler, which compiles
//! each variant once per platform. Output is printed in the order the
//! platforms were given.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use stagewright::build::compile::{
    OPTION_ENTRYPOINT_ARGS, OPTION_RUN_VARIANT, OPTION_RUN_VARIANT_ENV,
};
use stagewright::build::{CompileResult, Compiler, Options, Platform, Target};
use stagewright::dockerfile;

use super::{load_config, ConfigArg};

/// Output formats for compiled results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Multi-stage Dockerfile text
    Dockerfile,
    /// Build-graph state of every target as JSON
    Json,
}

/// Compile a variant and print its build graph
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Name of the variant to compile.
    #[arg(value_name = "VARIANT")]
    pub variant: String,

    #[command(flatten)]
    pub config: ConfigArg,

    /// Target platform as os/arch[/variant]. May be repeated.
    #[arg(long = "platform", value_name = "PLATFORM")]
    pub platforms: Vec<Platform>,

    /// Output format.
    #[arg(long, value_enum, default_value = "dockerfile")]
    pub format: OutputFormat,

    /// Run the variant's entrypoint as the final build step.
    #[arg(long)]
    pub run_variant: bool,

    /// Extra entrypoint arguments for --run-variant, as a JSON list.
    #[arg(long, value_name = "JSON")]
    pub entrypoint_args: Option<String>,

    /// Environment for --run-variant, as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub run_variant_env: Option<String>,
}

#[derive(Serialize)]
struct PlatformOutput<'a> {
    platform: String,
    targets: Vec<&'a Target>,
}

impl CompileArgs {
    /// The extra build options in the string form a build client sends them.
    fn build_options(&self) -> BTreeMap<String, String> {
        let mut build_options = BTreeMap::new();
        if self.run_variant {
            build_options.insert(OPTION_RUN_VARIANT.to_string(), "true".to_string());
        }
        if let Some(args) = &self.entrypoint_args {
            build_options.insert(OPTION_ENTRYPOINT_ARGS.to_string(), args.clone());
        }
        if let Some(env) = &self.run_variant_env {
            build_options.insert(OPTION_RUN_VARIANT_ENV.to_string(), env.clone());
        }
        build_options
    }

    fn platforms(&self) -> Vec<Platform> {
        if self.platforms.is_empty() {
            vec![Platform::default()]
        } else {
            self.platforms.clone()
        }
    }
}

/// Execute the `compile` command.
pub fn execute(args: CompileArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    let mut options = Options::from_build_options(&args.variant, &args.build_options())
        .context("Invalid build options")?;
    options.layout = config.layout().clone();

    let compileables = config
        .variant_compileables(&args.variant)
        .with_context(|| format!("Failed to expand variant {}", args.variant))?;
    log::info!(
        "Compiling {} with {} variant(s)",
        args.variant,
        compileables.len()
    );

    let compiler = Compiler::new(compileables, options);
    let platforms = args.platforms();
    let results: Vec<(Platform, CompileResult)> = platforms
        .par_iter()
        .map(|platform| {
            compiler
                .compile(platform)
                .map(|result| (platform.clone(), result))
                .with_context(|| format!("Failed to compile {} for {}", args.variant, platform))
        })
        .collect::<Result<Vec<_>>>()?;

    print!("{}", render(&results, args.format)?);
    Ok(())
}

fn render(results: &[(Platform, CompileResult)], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Dockerfile => {
            let mut out = String::new();
            for (platform, result) in results {
                if results.len() > 1 {
                    out.push_str(&format!("# platform: {}\n", platform));
                }
                out.push_str(&dockerfile::render(result)?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let outputs: Vec<PlatformOutput<'_>> = results
                .iter()
                .map(|(platform, result)| PlatformOutput {
                    platform: platform.to_string(),
                    targets: dockerfile::stages(result),
                })
                .collect();
            Ok(format!("{}\n", serde_json::to_string_pretty(&outputs)?))
        }
    }
}
