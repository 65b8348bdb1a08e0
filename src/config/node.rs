use serde::{Deserialize, Serialize};

use super::artifacts::RequirementsConfig;
use super::flag::Flag;
use crate::build::{Instruction, Phase, PhaseCompileable, Run};
use crate::defaults::Layout;

/// Installs npm dependencies from the given requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsConfig>,
    /// Value of `NODE_ENV`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub use_npm_ci: Flag,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub allow_dedupe: Flag,
}

impl NodeConfig {
    pub fn dependencies(&self) -> Vec<String> {
        self.requirements
            .as_ref()
            .map(RequirementsConfig::dependencies)
            .unwrap_or_default()
    }

    pub fn merge(&mut self, other: &NodeConfig) {
        if other.requirements.is_some() {
            self.requirements = other.requirements.clone();
        }
        if !other.env.is_empty() {
            self.env = other.env.clone();
        }
        self.use_npm_ci.merge(&other.use_npm_ci);
        self.allow_dedupe.merge(&other.allow_dedupe);
    }

    fn is_production(&self) -> bool {
        self.env == "production"
    }
}

impl PhaseCompileable for NodeConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        match phase {
            Phase::PreInstall => {
                let Some(requirements) = self.requirements.as_ref().filter(|r| !r.is_empty()) else {
                    return Vec::new();
                };

                let mut instructions = requirements.instructions_for_phase(phase, layout);

                let install = if self.use_npm_ci.is_true() { "npm ci" } else { "npm install" };
                let mut arguments = Vec::new();
                if self.is_production() {
                    arguments.push("--production");
                }

                let mut runs = vec![Run::new(install, arguments)];
                if self.is_production() && self.allow_dedupe.is_true() {
                    runs.push(Run::new("npm dedupe", Vec::<String>::new()));
                }

                instructions.push(Instruction::RunAll(runs));
                instructions
            }
            Phase::PostInstall if !self.env.is_empty() => {
                vec![Instruction::env([("NODE_ENV", self.env.as_str())])]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Copy;

    #[test]
    fn test_parse() {
        let node: NodeConfig =
            serde_yaml::from_str("{requirements: [package.json], env: production, use-npm-ci: true}").unwrap();
        assert_eq!(node.env, "production");
        assert!(node.use_npm_ci.is_true());
        assert!(node.allow_dedupe.is_unset());
        assert_eq!(node.dependencies(), Vec::<String>::new());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut node: NodeConfig = serde_yaml::from_str("{requirements: [package.json], env: foo}").unwrap();
        node.merge(&serde_yaml::from_str("{env: bar}").unwrap());
        assert_eq!(node.env, "bar");
        assert!(node.requirements.is_some());
    }

    #[test]
    fn test_install_instructions() {
        let node: NodeConfig = serde_yaml::from_str("{requirements: [package.json], env: foo}").unwrap();
        let layout = Layout::default();

        assert!(node.instructions_for_phase(Phase::Privileged, &layout).is_empty());
        assert_eq!(
            node.instructions_for_phase(Phase::PreInstall, &layout),
            vec![
                Instruction::Copy(Copy::new(["package.json"], "./")),
                Instruction::RunAll(vec![Run::new("npm install", Vec::<String>::new())]),
            ]
        );
        assert_eq!(
            node.instructions_for_phase(Phase::PostInstall, &layout),
            vec![Instruction::env([("NODE_ENV", "foo")])]
        );
    }

    #[test]
    fn test_production_ci_with_dedupe() {
        let node: NodeConfig = serde_yaml::from_str(
            "{requirements: [package.json, package-lock.json], env: production, use-npm-ci: true, allow-dedupe: true}",
        )
        .unwrap();

        assert_eq!(
            node.instructions_for_phase(Phase::PreInstall, &Layout::default()),
            vec![
                Instruction::Copy(Copy::new(["package.json", "package-lock.json"], "./")),
                Instruction::RunAll(vec![
                    Run::new("npm ci", ["--production"]),
                    Run::new("npm dedupe", Vec::<String>::new()),
                ]),
            ]
        );
    }

    #[test]
    fn test_environment_only() {
        let node: NodeConfig = serde_yaml::from_str("env: production").unwrap();
        let layout = Layout::default();
        assert!(node.instructions_for_phase(Phase::PreInstall, &layout).is_empty());
        assert_eq!(node.instructions_for_phase(Phase::PostInstall, &layout).len(), 1);
    }
}
