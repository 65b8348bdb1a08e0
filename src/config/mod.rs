//! # Configuration
//!
//! This module parses the YAML configuration document, resolves variant
//! inheritance, and produces the set of variants a compilation needs.
//!
//! ## Document Shape
//!
//! ```yaml
//! version: v4
//! base: docker-registry.example/bookworm:latest
//! lives:
//!   in: /srv/service
//! variants:
//!   build:
//!     builder:
//!       command: [make]
//!       requirements: [Makefile, src/]
//!   production:
//!     copies: [build]
//!     entrypoint: [./service]
//! ```
//!
//! Every key allowed at the root except `version` and `variants` is also
//! allowed in a variant, where it overrides or extends the root. Variants may
//! additionally `include` other variants and declare `copies`.
//!
//! ## Expansion
//!
//! [`Config::expand`] produces the effective configuration of one variant by
//! merging, in order: the built-in account defaults, the document root,
//! every transitively included variant (dependencies first), and the variant
//! itself. Expansion never modifies the parsed document, so expanding the
//! same variant twice gives the same result.
//!
//! ## Dependencies
//!
//! [`Config::variant_compileables`] walks the data dependencies of a variant
//! (base, copies, requirements, and mounts naming another variant) and
//! returns every expanded variant the compilation needs, dependencies first.

mod apt;
mod arguments;
mod artifacts;
mod builder;
mod common;
mod flag;
mod mounts;
mod node;
mod python;
mod shorthand;
mod user;
mod variant;

pub mod validation;

#[cfg(test)]
mod expand_proptest;

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use apt::{AptConfig, AptPackages, AptProxies, AptProxy, AptSource};
pub use arguments::ArgumentsConfig;
pub use artifacts::{ArtifactsConfig, CopiesConfig, RequirementsConfig};
pub use builder::{BuilderConfig, BuilderEntry, BuildersConfig};
pub use common::CommonConfig;
pub use flag::Flag;
pub use mounts::{CacheConfig, CachesConfig, MountConfig, MountsConfig};
pub use node::NodeConfig;
pub use python::{PoetryConfig, PythonConfig, UvConfig};
pub use user::{LivesConfig, RunsConfig, UserConfig};
pub use variant::VariantConfig;

use crate::defaults::{Layout, UserDefaults};
use crate::depgraph::DepGraph;
use crate::error::{Error, Result};

/// A parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantConfig>,
    #[serde(skip)]
    user_defaults: UserDefaults,
    #[serde(skip)]
    layout: Layout,
}

/// Parses a configuration document.
///
/// Parsing only checks that the document fits the schema; call
/// [`validation::validate`] before expanding or compiling.
pub fn parse(yaml_content: &str) -> Result<Config> {
    let mut config: Config = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: parse_hint(yaml_content),
    })?;

    for (name, variant) in config.variants.iter_mut() {
        variant.name = name.clone();
    }

    Ok(config)
}

/// Reads and parses a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

fn parse_hint(yaml_content: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml_content).ok()?;
    match value.get("variants") {
        Some(serde_yaml::Value::Mapping(_)) | None => None,
        Some(_) => Some("`variants` must be a mapping of variant name to configuration".to_string()),
    }
}

impl Config {
    /// Replaces the built-in filesystem layout used for expansion.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the default `lives` and `runs` accounts.
    pub fn with_user_defaults(mut self, defaults: UserDefaults) -> Self {
        self.user_defaults = defaults;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The variant as declared in the document, before expansion.
    pub fn variant(&self, name: &str) -> Result<&VariantConfig> {
        self.variants.get(name).ok_or_else(|| Error::UnknownVariant {
            name: name.to_string(),
        })
    }

    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    /// Inheritance graph of `includes`.
    pub fn includes_graph(&self) -> DepGraph {
        let mut graph = DepGraph::new();
        for (name, variant) in &self.variants {
            for include in &variant.includes {
                graph.add_edge(name, include);
            }
        }
        graph
    }

    /// The effective configuration of the named variant.
    pub fn expand(&self, name: &str) -> Result<VariantConfig> {
        self.variant(name)?;

        let includes = self.includes_graph().get_deps(name)?;

        let mut expanded = VariantConfig {
            name: name.to_string(),
            common: CommonConfig::with_defaults(&self.user_defaults),
            ..VariantConfig::default()
        };
        expanded.common.merge(&self.common);

        for include in includes.iter().map(String::as_str).chain(std::iter::once(name)) {
            expanded.merge(self.variant(include)?);
        }

        let copies = expanded.copies.expand(&expanded.common.lives.in_, &self.layout);
        let mut deduplicated = CopiesConfig::default();
        for artifact in copies.0 {
            deduplicated.merge(&CopiesConfig(vec![artifact]));
        }
        expanded.copies = deduplicated;

        log::debug!("expanded variant {} (includes: {:?})", name, includes);
        Ok(expanded)
    }

    /// Data-dependency graph reachable from `root`, with the expanded
    /// variants it was built from.
    fn data_dependencies(&self, root: &str) -> Result<(DepGraph, BTreeMap<String, VariantConfig>)> {
        let mut graph = DepGraph::new();
        let mut expanded = BTreeMap::new();
        let mut queue = VecDeque::from([root.to_string()]);

        while let Some(name) = queue.pop_front() {
            if expanded.contains_key(&name) {
                continue;
            }

            let variant = self.expand(&name)?;
            for dependency in variant.dependencies() {
                if self.has_variant(&dependency) {
                    graph.add_edge(&name, &dependency);
                    queue.push_back(dependency);
                }
            }
            expanded.insert(name, variant);
        }

        Ok((graph, expanded))
    }

    /// Data-dependency graph (base, copies, requirements, mounts) rooted at
    /// the named variant.
    pub fn dependency_graph(&self, root: &str) -> Result<DepGraph> {
        let (graph, _) = self.data_dependencies(root)?;
        graph.get_deps(root)?;
        Ok(graph)
    }

    /// Every expanded variant needed to compile `root`, dependencies first
    /// and `root` last.
    pub fn variant_compileables(&self, root: &str) -> Result<Vec<VariantConfig>> {
        let (graph, mut expanded) = self.data_dependencies(root)?;
        let order = graph.get_deps(root)?;

        order
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(root))
            .map(|name| {
                expanded.remove(name).ok_or_else(|| Error::UnknownVariant {
                    name: name.to_string(),
                })
            })
            .collect()
    }
}
