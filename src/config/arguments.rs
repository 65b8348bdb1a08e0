use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::build::{Instruction, Phase, PhaseCompileable};
use crate::defaults::Layout;

/// Build arguments and their default values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentsConfig(pub BTreeMap<String, String>);

impl ArgumentsConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Later values win per key.
    pub fn merge(&mut self, other: &ArgumentsConfig) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }
}

impl PhaseCompileable for ArgumentsConfig {
    fn instructions_for_phase(&self, phase: Phase, _layout: &Layout) -> Vec<Instruction> {
        if phase != Phase::Privileged {
            return Vec::new();
        }

        self.0
            .iter()
            .map(|(name, default)| Instruction::string_arg(name, default))
            .collect()
    }
}
