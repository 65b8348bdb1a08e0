//! # Expand Command Implementation
//!
//! Prints the effective configuration of one variant as YAML: the root
//! defaults, the document root and every included variant merged into it,
//! with its copies expanded. Useful for checking what an `includes` chain
//! actually resolves to.

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, ConfigArg};

/// Print the effective configuration of a variant
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Name of the variant to expand.
    #[arg(value_name = "VARIANT")]
    pub variant: String,

    #[command(flatten)]
    pub config: ConfigArg,
}

/// Execute the `expand` command.
pub fn execute(args: ExpandArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let expanded = config
        .expand(&args.variant)
        .with_context(|| format!("Failed to expand variant {}", args.variant))?;

    print!("{}", serde_yaml::to_string(&expanded)?);
    Ok(())
}
