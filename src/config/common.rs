use serde::{Deserialize, Serialize};

use super::apt::AptConfig;
use super::arguments::ArgumentsConfig;
use super::builder::{BuilderConfig, BuildersConfig};
use super::node::NodeConfig;
use super::python::PythonConfig;
use super::user::{LivesConfig, RunsConfig};
use crate::build::{Instruction, Phase, PhaseCompileable};
use crate::defaults::{Layout, UserDefaults};

/// Keys allowed both at the document root and in every variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Image reference or variant name. Empty for a scratch stage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base: String,
    #[serde(default, skip_serializing_if = "ArgumentsConfig::is_empty")]
    pub arguments: ArgumentsConfig,
    #[serde(default, skip_serializing_if = "AptConfig::is_empty")]
    pub apt: AptConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builders: Option<BuildersConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderConfig>,
    #[serde(default)]
    pub lives: LivesConfig,
    #[serde(default)]
    pub runs: RunsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
}

impl CommonConfig {
    /// An empty config carrying the default `lives` and `runs` accounts.
    pub fn with_defaults(defaults: &UserDefaults) -> Self {
        Self {
            lives: LivesConfig::with_defaults(defaults),
            runs: RunsConfig::with_defaults(defaults),
            ..Self::default()
        }
    }

    pub fn is_scratch(&self) -> bool {
        self.base.is_empty()
    }

    /// Variants referenced by requirements and builder mounts.
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps = Vec::new();
        if let Some(node) = &self.node {
            deps.extend(node.dependencies());
        }
        if let Some(python) = &self.python {
            deps.extend(python.dependencies());
        }
        if let Some(builder) = &self.builder {
            deps.extend(builder.dependencies());
        }
        if let Some(builders) = &self.builders {
            deps.extend(builders.dependencies());
        }
        deps
    }

    pub fn merge(&mut self, other: &CommonConfig) {
        if !other.base.is_empty() {
            self.base = other.base.clone();
        }

        self.arguments.merge(&other.arguments);
        self.apt.merge(&other.apt);

        if other.builders.is_some() {
            self.builders = other.builders.clone();
        }

        merge_option(&mut self.node, &other.node, NodeConfig::merge);
        merge_option(&mut self.python, &other.python, PythonConfig::merge);
        merge_option(&mut self.builder, &other.builder, BuilderConfig::merge);

        self.lives.merge(&other.lives);
        self.runs.merge(&other.runs);

        if other.entrypoint.is_some() {
            self.entrypoint = other.entrypoint.clone();
        }
    }

    fn fragments(&self) -> Vec<&dyn PhaseCompileable> {
        let mut fragments: Vec<&dyn PhaseCompileable> = vec![&self.arguments, &self.apt];
        if let Some(builders) = &self.builders {
            fragments.push(builders);
        }
        if let Some(node) = &self.node {
            fragments.push(node);
        }
        if let Some(python) = &self.python {
            fragments.push(python);
        }
        if let Some(builder) = &self.builder {
            fragments.push(builder);
        }
        fragments.push(&self.lives);
        fragments.push(&self.runs);
        fragments
    }
}

fn merge_option<T: Clone>(current: &mut Option<T>, other: &Option<T>, merge: fn(&mut T, &T)) {
    match (current.as_mut(), other) {
        (Some(current), Some(other)) => merge(current, other),
        (None, Some(other)) => *current = Some(other.clone()),
        (_, None) => {}
    }
}

impl PhaseCompileable for CommonConfig {
    /// Fragment instructions in visiting order. Scratch stages get none.
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        if self.is_scratch() {
            return Vec::new();
        }

        self.fragments()
            .into_iter()
            .flat_map(|fragment| fragment.instructions_for_phase(phase, layout))
            .collect()
    }
}
