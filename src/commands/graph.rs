//! # Graph Command Implementation
//!
//! This module implements the `graph` subcommand, which displays the data
//! dependencies of a variant as a tree: every variant whose output it
//! copies, mounts, requires, or builds on, recursively.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::{Context, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};

use stagewright::depgraph::DepGraph;

use super::{load_config, ConfigArg};

/// Display the data dependency tree of a variant
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Name of the root variant.
    #[arg(value_name = "VARIANT")]
    pub variant: String,

    #[command(flatten)]
    pub config: ConfigArg,

    /// Maximum depth to display in the tree.
    ///
    /// If not specified, displays the full tree. Use 0 to show only the root.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `graph` command.
pub fn execute(args: GraphArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    // fails on unknown variants and cycles before anything is printed
    let graph = config
        .dependency_graph(&args.variant)
        .with_context(|| format!("Failed to resolve dependencies of {}", args.variant))?;

    let tree_root = build_tree_node(&graph, &args.variant, args.depth.unwrap_or(usize::MAX), 0);
    print_tree(&tree_root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

    Ok(())
}

fn build_tree_node(graph: &DepGraph, name: &str, max_depth: usize, current_depth: usize) -> TreeNode {
    let children = if current_depth >= max_depth {
        Vec::new()
    } else {
        graph
            .direct_deps(name)
            .iter()
            .map(|dep| build_tree_node(graph, dep, max_depth, current_depth + 1))
            .collect()
    };

    TreeNode {
        label: name.to_string(),
        children,
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
