//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Stagewright - Compile variant-based image build configuration
#[derive(Parser, Debug)]
#[command(name = "stagewright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a variant and print its build graph
    Compile(commands::compile::CompileArgs),

    /// Validate a configuration file
    Validate(commands::validate::ValidateArgs),

    /// Print the effective configuration of a variant
    Expand(commands::expand::ExpandArgs),

    /// Display the data dependency tree of a variant
    Graph(commands::graph::GraphArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Compile(args) => commands::compile::execute(args),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Expand(args) => commands::expand::execute(args),
            Commands::Graph(args) => commands::graph::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // a logger may already be installed when embedded in tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();
}
