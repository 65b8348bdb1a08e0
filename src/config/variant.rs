use serde::{Deserialize, Serialize};

use super::artifacts::CopiesConfig;
use super::common::CommonConfig;
use crate::build::{macros, Instruction, Phase, PhaseCompileable, TargetCompileable};
use crate::defaults::Layout;

/// A named build variant.
///
/// As parsed, a variant only holds what its own document section declares.
/// [`Config::expand`](super::Config::expand) returns the effective variant,
/// with the root, every include and the root defaults merged in and its
/// copies expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantConfig {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default, skip_serializing_if = "CopiesConfig::is_empty")]
    pub copies: CopiesConfig,
    #[serde(flatten)]
    pub common: CommonConfig,
}

impl VariantConfig {
    /// Names this variant may depend on for data: its base, copies,
    /// requirements and mounts. Names that are not variants are filtered
    /// out by the caller.
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps = Vec::new();
        if !self.common.base.is_empty() {
            deps.push(self.common.base.clone());
        }
        deps.extend(self.copies.dependencies());
        deps.extend(self.common.dependencies());
        deps
    }

    pub fn merge(&mut self, other: &VariantConfig) {
        self.common.merge(&other.common);
        self.copies.merge(&other.copies);
    }

    fn is_scratch(&self) -> bool {
        self.common.is_scratch()
    }
}

impl PhaseCompileable for VariantConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        let fragments = self.common.instructions_for_phase(phase, layout);

        match phase {
            Phase::Privileged => {
                instructions.push(if self.is_scratch() {
                    Instruction::ScratchBase {
                        stage: self.name.clone(),
                    }
                } else {
                    Instruction::Base {
                        image: self.common.base.clone(),
                        stage: self.name.clone(),
                    }
                });
                instructions.extend(fragments);
            }
            Phase::PrivilegeDropped => {
                if !self.is_scratch() {
                    instructions.push(Instruction::User {
                        uid: "$LIVES_UID".to_string(),
                    });
                    instructions.push(macros::home("$LIVES_AS", layout));
                }
                instructions.extend(fragments);
            }
            Phase::PreInstall => instructions.extend(fragments),
            Phase::Install => {
                let copies = self.copies.instructions_for_phase(phase, layout);
                if self.is_scratch() {
                    // no accounts exist in a scratch stage
                    instructions.extend(copies);
                } else {
                    instructions.extend(macros::apply_user("$LIVES_UID", "$LIVES_GID", copies));
                }
                instructions.extend(fragments);
            }
            Phase::PostInstall => {
                instructions.extend(fragments);
                if !self.is_scratch() && !self.common.runs.insecurely.is_true() {
                    instructions.push(Instruction::User {
                        uid: "$RUNS_UID".to_string(),
                    });
                    instructions.push(macros::home("$RUNS_AS", layout));
                }
                if let Some(entrypoint) = &self.common.entrypoint {
                    instructions.push(Instruction::EntryPoint(entrypoint.clone()));
                }
            }
        }

        instructions
    }
}

impl TargetCompileable for VariantConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_ref(&self) -> Option<&str> {
        if self.is_scratch() {
            None
        } else {
            Some(&self.common.base)
        }
    }
}
