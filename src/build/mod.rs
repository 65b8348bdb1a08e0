//! # Build Model
//!
//! This module turns configuration into build-graph state. It is organized
//! the same way a build flows through it:
//!
//! 1.  **Phases**: Every configuration fragment contributes instructions per
//!     [`Phase`]. Phases run in a fixed order and a later phase never emits
//!     before an earlier one.
//! 2.  **Instructions** (`instruction`): Engine-agnostic build steps (run,
//!     copy, set environment, ...) with their primitive token form.
//! 3.  **Run options** (`run_option`): Cache and source mounts attached to
//!     run instructions.
//! 4.  **Macros** (`macros`): Helpers producing common instruction sequences
//!     such as user creation and ownership changes.
//! 5.  **Targets** (`target`): The evolving build-graph state of one variant.
//! 6.  **Compilation** (`compile`): The orchestrator that compiles each named
//!     variant exactly once and wires cross-variant references together.

pub mod compile;
pub mod instruction;
pub mod macros;
pub mod run_option;
pub mod target;

use std::fmt;

use serde::Serialize;

use crate::defaults::Layout;

pub use compile::{CancelToken, CompileResult, Compiler, Options};
pub use instruction::{Copy, Instruction, Run};
pub use run_option::{CacheMount, RunOption, SourceMount};
pub use target::{Context, ContextLookup, ContextOpt, NamedContextResolver, Op, Platform, Target};

/// One of the ordered stages instructions are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Phase {
    /// Root-level setup: packages, accounts, build arguments.
    Privileged,
    /// Switch to the unprivileged account and set its environment.
    PrivilegeDropped,
    /// Copy requirement files, run builders, install dependencies.
    PreInstall,
    /// Copy application files.
    Install,
    /// Working directory, runtime user, and entrypoint.
    PostInstall,
}

impl Phase {
    /// All phases in the order they are compiled.
    pub const ALL: [Phase; 5] = [
        Phase::Privileged,
        Phase::PrivilegeDropped,
        Phase::PreInstall,
        Phase::Install,
        Phase::PostInstall,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Privileged => "privileged",
            Phase::PrivilegeDropped => "privilege-dropped",
            Phase::PreInstall => "pre-install",
            Phase::Install => "install",
            Phase::PostInstall => "post-install",
        };
        write!(f, "{}", name)
    }
}

/// A configuration fragment that contributes instructions to build phases.
pub trait PhaseCompileable {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction>;
}

/// A named, phase-compileable unit that becomes one build target.
pub trait TargetCompileable: PhaseCompileable {
    fn name(&self) -> &str;

    /// The base reference, or `None` for a scratch stage.
    fn base_ref(&self) -> Option<&str>;
}

/// Collects the instructions of every phase in order.
pub fn instructions_in_order<C>(compileable: &C, layout: &Layout) -> Vec<(Phase, Instruction)>
where
    C: PhaseCompileable + ?Sized,
{
    Phase::ALL
        .iter()
        .flat_map(|phase| {
            compileable
                .instructions_for_phase(*phase, layout)
                .into_iter()
                .map(move |instruction| (*phase, instruction))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl PhaseCompileable for Fixed {
        fn instructions_for_phase(&self, phase: Phase, _layout: &Layout) -> Vec<Instruction> {
            match phase {
                Phase::PostInstall => vec![Instruction::WorkingDirectory("/srv/app".to_string())],
                Phase::Privileged => vec![Instruction::run("apt-get update", Vec::<String>::new())],
                _ => vec![],
            }
        }
    }

    #[test]
    fn test_phase_order_is_total() {
        let mut sorted = Phase::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Phase::ALL.to_vec());
        assert!(Phase::PreInstall < Phase::PostInstall);
    }

    #[test]
    fn test_instructions_in_order_groups_by_phase() {
        let ordered = instructions_in_order(&Fixed, &Layout::default());
        let phases: Vec<Phase> = ordered.iter().map(|(phase, _)| *phase).collect();
        assert_eq!(phases, vec![Phase::Privileged, Phase::PostInstall]);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::PrivilegeDropped.to_string(), "privilege-dropped");
    }
}
