//! Custom build steps (`builder`) and the ordered `builders` list.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use super::artifacts::RequirementsConfig;
use super::mounts::{CachesConfig, MountsConfig};
use super::node::NodeConfig;
use super::python::PythonConfig;
use super::shorthand;
use crate::build::{Instruction, Phase, PhaseCompileable, Run};
use crate::defaults::Layout;

/// A command or script run in the pre-install phase, with optional mounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// A single command string or an argument list.
    #[serde(
        default,
        deserialize_with = "shorthand::string_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounts: Option<MountsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caches: Option<CachesConfig>,
}

impl BuilderConfig {
    pub fn has_command(&self) -> bool {
        self.command.as_ref().is_some_and(|command| !command.is_empty())
    }

    pub fn has_script(&self) -> bool {
        self.script.as_ref().is_some_and(|script| !script.is_empty())
    }

    pub fn dependencies(&self) -> Vec<String> {
        let mut deps = self
            .requirements
            .as_ref()
            .map(RequirementsConfig::dependencies)
            .unwrap_or_default();
        if let Some(mounts) = &self.mounts {
            deps.extend(mounts.dependencies());
        }
        deps
    }

    /// Replaces every field the other config sets.
    pub fn merge(&mut self, other: &BuilderConfig) {
        if other.command.is_some() {
            self.command = other.command.clone();
        }
        if other.has_script() {
            self.script = other.script.clone();
        }
        if other.requirements.is_some() {
            self.requirements = other.requirements.clone();
        }
        if other.mounts.is_some() {
            self.mounts = other.mounts.clone();
        }
        if other.caches.is_some() {
            self.caches = other.caches.clone();
        }
    }
}

impl PhaseCompileable for BuilderConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        let mut instructions = self
            .requirements
            .as_ref()
            .map(|requirements| requirements.instructions_for_phase(phase, layout))
            .unwrap_or_default();

        if phase != Phase::PreInstall {
            return instructions;
        }

        let mut options = self.mounts.as_ref().map(MountsConfig::run_options).unwrap_or_default();
        options.extend(self.caches.as_ref().map(CachesConfig::run_options).unwrap_or_default());

        // validation rejects expanded variants setting both command and script
        if let Some(script) = self.script.as_ref().filter(|script| !script.is_empty()) {
            instructions.push(Instruction::RunScript {
                script: script.clone(),
                options,
            });
        } else if let Some((command, arguments)) = self.command.as_ref().and_then(|c| c.split_first()) {
            instructions.push(Instruction::RunAllWithOptions {
                runs: vec![Run::new(command, arguments.iter().cloned())],
                options,
            });
        }

        instructions
    }
}

/// One entry of the `builders` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderEntry {
    Custom(BuilderConfig),
    Node(NodeConfig),
    Python(PythonConfig),
}

impl BuilderEntry {
    /// The key the entry is written under.
    pub fn key(&self) -> &'static str {
        match self {
            BuilderEntry::Custom(_) => "custom",
            BuilderEntry::Node(_) => "node",
            BuilderEntry::Python(_) => "python",
        }
    }

    pub fn dependencies(&self) -> Vec<String> {
        match self {
            BuilderEntry::Custom(builder) => builder.dependencies(),
            BuilderEntry::Node(node) => node.dependencies(),
            BuilderEntry::Python(python) => python.dependencies(),
        }
    }

    fn from_mapping(mapping: Mapping) -> Result<Self, String> {
        if mapping.len() != 1 {
            return Err(format!(
                "each builders entry must have exactly one of custom, node or python, found {} keys",
                mapping.len()
            ));
        }

        let (key, value) = mapping
            .into_iter()
            .next()
            .ok_or_else(|| "empty builders entry".to_string())?;

        let parsed = match key.as_str() {
            Some("custom") => serde_yaml::from_value(value).map(BuilderEntry::Custom),
            Some("node") => serde_yaml::from_value(value).map(BuilderEntry::Node),
            Some("python") => serde_yaml::from_value(value).map(BuilderEntry::Python),
            _ => return Err(format!("unknown builder {:?}, expected custom, node or python", key)),
        };
        parsed.map_err(|e| e.to_string())
    }
}

impl PhaseCompileable for BuilderEntry {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        match self {
            BuilderEntry::Custom(builder) => builder.instructions_for_phase(phase, layout),
            BuilderEntry::Node(node) => node.instructions_for_phase(phase, layout),
            BuilderEntry::Python(python) => python.instructions_for_phase(phase, layout),
        }
    }
}

impl Serialize for BuilderEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            BuilderEntry::Custom(builder) => map.serialize_entry("custom", builder)?,
            BuilderEntry::Node(node) => map.serialize_entry("node", node)?,
            BuilderEntry::Python(python) => map.serialize_entry("python", python)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BuilderEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Mapping(mapping) => BuilderEntry::from_mapping(mapping).map_err(D::Error::custom),
            _ => Err(D::Error::custom("builders entries must be mappings")),
        }
    }
}

/// Builders compiled in list order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildersConfig(pub Vec<BuilderEntry>);

impl BuildersConfig {
    pub fn iter(&self) -> impl Iterator<Item = &BuilderEntry> {
        self.0.iter()
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.0.iter().flat_map(BuilderEntry::dependencies).collect()
    }
}

impl PhaseCompileable for BuildersConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        self.0
            .iter()
            .flat_map(|entry| entry.instructions_for_phase(phase, layout))
            .collect()
    }
}
