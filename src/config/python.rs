//! Python virtualenv setup and dependency installation with pip, Poetry or
//! uv.

use serde::{Deserialize, Serialize};

use super::artifacts::{ArtifactsConfig, RequirementsConfig};
use super::flag::Flag;
use crate::build::{macros, Instruction, Phase, PhaseCompileable, Run};
use crate::defaults::Layout;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoetryConfig {
    /// Version constraint appended to the package name, e.g. `==1.8.2`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub devel: Flag,
}

impl PoetryConfig {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty() && self.devel.is_unset()
    }

    pub fn merge(&mut self, other: &PoetryConfig) {
        if !other.version.is_empty() {
            self.version = other.version.clone();
        }
        self.devel.merge(&other.devel);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UvConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub devel: Flag,
    /// `pip` installs from `requirements.txt` instead of syncing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

impl UvConfig {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty() && self.devel.is_unset() && self.variant.is_empty()
    }

    pub fn merge(&mut self, other: &UvConfig) {
        if !other.version.is_empty() {
            self.version = other.version.clone();
        }
        if !other.variant.is_empty() {
            self.variant = other.variant.clone();
        }
        self.devel.merge(&other.devel);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PythonConfig {
    /// Interpreter executable, e.g. `python3`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsConfig>,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub use_system_site_packages: Flag,
    #[serde(default, skip_serializing_if = "Flag::is_unset")]
    pub no_deps: Flag,
    #[serde(default, skip_serializing_if = "PoetryConfig::is_empty")]
    pub poetry: PoetryConfig,
    #[serde(default, skip_serializing_if = "UvConfig::is_empty")]
    pub uv: UvConfig,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tox_version: String,
}

impl PythonConfig {
    pub fn dependencies(&self) -> Vec<String> {
        self.requirements
            .as_ref()
            .map(RequirementsConfig::dependencies)
            .unwrap_or_default()
    }

    pub fn merge(&mut self, other: &PythonConfig) {
        self.use_system_site_packages.merge(&other.use_system_site_packages);
        self.no_deps.merge(&other.no_deps);
        self.poetry.merge(&other.poetry);
        self.uv.merge(&other.uv);
        if !other.version.is_empty() {
            self.version = other.version.clone();
        }
        if other.requirements.is_some() {
            self.requirements = other.requirements.clone();
        }
        if !other.tox_version.is_empty() {
            self.tox_version = other.tox_version.clone();
        }
    }

    fn is_enabled(&self) -> bool {
        !self.version.is_empty() && self.requirements.is_some()
    }

    fn python(&self) -> &str {
        if self.version.is_empty() {
            "python"
        } else {
            &self.version
        }
    }

    fn use_poetry(&self) -> bool {
        !self.poetry.version.is_empty()
    }

    fn use_uv(&self) -> bool {
        !self.uv.version.is_empty()
    }

    fn pip_package(&self) -> &'static str {
        if self.python().starts_with("python2") {
            "pip<21"
        } else {
            "pip"
        }
    }

    fn tox_package(&self) -> String {
        if self.tox_version.is_empty() {
            "tox".to_string()
        } else {
            format!("tox=={}", self.tox_version)
        }
    }

    /// `-r <file>` pairs for every requirement.
    pub fn requirements_args(&self) -> Vec<String> {
        self.requirements
            .iter()
            .flat_map(RequirementsConfig::iter)
            .flat_map(|requirement: &ArtifactsConfig| {
                ["-r".to_string(), requirement.effective_destination().to_string()]
            })
            .collect()
    }

    fn package_manager_setup(&self, layout: &Layout) -> Vec<Instruction> {
        let python = self.python();
        let mut instructions = vec![Instruction::RunAll(vec![
            Run::new(python, ["-m", "pip", "install", "-U", "setuptools!=60.9.0"]),
            Run::new(
                python,
                [
                    "-m".to_string(),
                    "pip".to_string(),
                    "install".to_string(),
                    "-U".to_string(),
                    "wheel".to_string(),
                    self.tox_package(),
                    self.pip_package().to_string(),
                ],
            ),
        ])];

        let (venvs_var, venvs_dir, package) = if self.use_poetry() {
            ("POETRY_VIRTUALENVS_PATH", "poetry", format!("poetry{}", self.poetry.version))
        } else {
            ("UV_VIRTUALENVS_PATH", "uv", format!("uv{}", self.uv.version))
        };

        instructions.push(Instruction::env([(venvs_var, layout.lib_path(venvs_dir))]));
        instructions.push(Instruction::run(python, ["-m", "pip", "install", "-U", package.as_str()]));
        instructions
    }

    fn install(&self, layout: &Layout) -> Vec<Instruction> {
        if self.use_poetry() {
            let mut arguments = vec!["install", "--no-root"];
            if !self.poetry.devel.is_true() {
                arguments.push("--no-dev");
            }
            return vec![
                Instruction::Run(macros::create_directory(&layout.lib_path("poetry"))),
                Instruction::run("poetry", arguments),
            ];
        }

        if self.use_uv() {
            let arguments = if self.uv.variant == "pip" {
                vec!["pip", "install", "-r", "requirements.txt"]
            } else if self.uv.devel.is_true() {
                vec!["sync"]
            } else {
                vec!["sync", "--no-group", "dev"]
            };
            return vec![
                Instruction::Run(macros::create_directory(&layout.lib_path("uv"))),
                Instruction::run("uv", arguments),
            ];
        }

        let requirements = self.requirements_args();
        if requirements.is_empty() {
            return Vec::new();
        }

        let mut arguments: Vec<String> = vec!["-m".into(), "pip".into(), "install".into()];
        if self.no_deps.is_true() {
            arguments.push("--no-deps".to_string());
        }
        arguments.extend(requirements);
        vec![Instruction::run(self.python(), arguments)]
    }
}

impl PhaseCompileable for PythonConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut instructions = self
            .requirements
            .as_ref()
            .map(|requirements| requirements.instructions_for_phase(phase, layout))
            .unwrap_or_default();
        let python = self.python();
        let venv = layout.lib_path("venv");

        match phase {
            Phase::PreInstall => {
                let mut venv_args = vec!["-m", "venv", venv.as_str()];
                if self.use_system_site_packages.is_true() {
                    venv_args.push("--system-site-packages");
                }
                instructions.push(Instruction::run(python, venv_args));
                instructions.push(Instruction::env([
                    ("VIRTUAL_ENV", venv.clone()),
                    ("PATH", format!("{}/bin:$PATH", venv)),
                ]));
                instructions.extend(self.package_manager_setup(layout));
                instructions.extend(self.install(layout));
            }
            Phase::PostInstall if !self.use_poetry() && self.no_deps.is_true() => {
                instructions.push(Instruction::run(python, ["-m", "pip", "check"]));
            }
            _ => {}
        }

        instructions
    }
}
