//! Account configuration: who owns the application files (`lives`) and who
//! runs the application (`runs`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::flag::Flag;
use crate::build::{macros, Instruction, Phase, PhaseCompileable};
use crate::defaults::{Layout, UserDefaults};

/// Name and ids of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "as", default, skip_serializing_if = "String::is_empty")]
    pub as_: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub uid: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub gid: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl UserConfig {
    /// Overrides fields the other config sets to a non-empty, non-zero value.
    pub fn merge(&mut self, other: &UserConfig) {
        if !other.as_.is_empty() {
            self.as_ = other.as_.clone();
        }
        if other.uid != 0 {
            self.uid = other.uid;
        }
        if other.gid != 0 {
            self.gid = other.gid;
        }
    }
}

/// The account owning application files, and where they live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivesConfig {
    #[serde(flatten)]
    pub user: UserConfig,
    #[serde(rename = "in", default, skip_serializing_if = "String::is_empty")]
    pub in_: String,
}

impl LivesConfig {
    pub fn with_defaults(defaults: &UserDefaults) -> Self {
        Self {
            user: UserConfig {
                as_: defaults.lives_as.clone(),
                uid: defaults.lives_uid,
                gid: defaults.lives_gid,
            },
            in_: defaults.lives_in.clone(),
        }
    }

    pub fn merge(&mut self, other: &LivesConfig) {
        self.user.merge(&other.user);
        if !other.in_.is_empty() {
            self.in_ = other.in_.clone();
        }
    }
}

impl PhaseCompileable for LivesConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        match phase {
            Phase::Privileged => {
                let mut runs = macros::create_user("$LIVES_AS", "$LIVES_UID", "$LIVES_GID", layout);
                runs.push(macros::create_directory(&self.in_));
                runs.push(macros::chown("$LIVES_UID", "$LIVES_GID", &self.in_));
                runs.push(macros::create_directory(&layout.local_lib_prefix));
                runs.push(macros::chown("$LIVES_UID", "$LIVES_GID", &layout.local_lib_prefix));

                vec![
                    Instruction::string_arg("LIVES_AS", &self.user.as_),
                    Instruction::UintArg {
                        name: "LIVES_UID".to_string(),
                        default: self.user.uid,
                    },
                    Instruction::UintArg {
                        name: "LIVES_GID".to_string(),
                        default: self.user.gid,
                    },
                    Instruction::RunAll(runs),
                ]
            }
            Phase::PrivilegeDropped => vec![Instruction::WorkingDirectory(self.in_.clone())],
            _ => Vec::new(),
        }
    }
}

/// The account the application runs as, and its runtime environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunsConfig {
    #[serde(flatten)]
    pub user: UserConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(rename = "in", default, skip_serializing_if = "String::is_empty")]
    pub in_: String,
    /// Run as the `lives` account instead of the unprivileged runtime user.
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub insecurely: Flag,
}

impl RunsConfig {
    pub fn with_defaults(defaults: &UserDefaults) -> Self {
        Self {
            user: UserConfig {
                as_: defaults.runs_as.clone(),
                uid: defaults.runs_uid,
                gid: defaults.runs_gid,
            },
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: &RunsConfig) {
        self.user.merge(&other.user);
        self.insecurely.merge(&other.insecurely);
        if !other.in_.is_empty() {
            self.in_ = other.in_.clone();
        }
        for (name, value) in &other.environment {
            self.environment.insert(name.clone(), value.clone());
        }
    }
}

impl PhaseCompileable for RunsConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        match phase {
            Phase::Privileged => vec![
                Instruction::string_arg("RUNS_AS", &self.user.as_),
                Instruction::UintArg {
                    name: "RUNS_UID".to_string(),
                    default: self.user.uid,
                },
                Instruction::UintArg {
                    name: "RUNS_GID".to_string(),
                    default: self.user.gid,
                },
                Instruction::RunAll(macros::create_user("$RUNS_AS", "$RUNS_UID", "$RUNS_GID", layout)),
            ],
            Phase::PrivilegeDropped if !self.environment.is_empty() => {
                vec![Instruction::Env(self.environment.clone())]
            }
            Phase::PostInstall if !self.in_.is_empty() => {
                vec![Instruction::WorkingDirectory(self.in_.clone())]
            }
            _ => Vec::new(),
        }
    }
}
