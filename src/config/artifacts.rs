//! Files copied into a variant: `requirements` (copied before dependencies
//! are installed) and `copies` (copied as the application itself).

use serde::{Deserialize, Deserializer, Serialize};

use super::shorthand;
use crate::build::{Copy, Instruction, Phase, PhaseCompileable};
use crate::defaults::{Layout, LOCAL_ARTIFACT_KEYWORD};

/// One file or directory copied from the build context or another variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub from: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,
}

impl ArtifactsConfig {
    pub fn local(source: &str) -> Self {
        Self {
            from: LOCAL_ARTIFACT_KEYWORD.to_string(),
            source: source.to_string(),
            destination: String::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.from == LOCAL_ARTIFACT_KEYWORD
    }

    /// The variant this artifact is copied from, if any.
    pub fn dependency(&self) -> Option<&str> {
        if self.is_local() || self.from.is_empty() {
            None
        } else {
            Some(&self.from)
        }
    }

    /// Where the artifact ends up: the destination, else the source, else
    /// the working directory.
    pub fn effective_destination(&self) -> &str {
        if !self.destination.is_empty() {
            &self.destination
        } else if !self.source.is_empty() {
            &self.source
        } else {
            "./"
        }
    }

    /// Fills in source and destination.
    ///
    /// A bare variant reference copies both the application directory and
    /// the shared library directory of that variant. A bare `local` copies
    /// the whole build context.
    pub fn expand(&self, app_dir: &str, layout: &Layout) -> Vec<ArtifactsConfig> {
        let bare = self.source.is_empty() && self.destination.is_empty();

        if bare && self.is_local() {
            return vec![Self {
                from: self.from.clone(),
                source: ".".to_string(),
                destination: ".".to_string(),
            }];
        }

        if bare {
            return [app_dir, layout.local_lib_prefix.as_str()]
                .iter()
                .map(|dir| Self {
                    from: self.from.clone(),
                    source: dir.to_string(),
                    destination: dir.to_string(),
                })
                .collect();
        }

        let source = if !self.source.is_empty() {
            self.source.clone()
        } else if self.is_local() {
            ".".to_string()
        } else {
            app_dir.to_string()
        };
        let destination = if self.destination.is_empty() {
            source.clone()
        } else {
            self.destination.clone()
        };

        vec![Self {
            from: self.from.clone(),
            source,
            destination,
        }]
    }

    fn copy_instruction(&self, copy: Copy) -> Instruction {
        if self.is_local() {
            Instruction::Copy(copy)
        } else {
            Instruction::CopyFrom {
                from: self.from.clone(),
                copy,
            }
        }
    }
}

impl PhaseCompileable for ArtifactsConfig {
    fn instructions_for_phase(&self, phase: Phase, _layout: &Layout) -> Vec<Instruction> {
        if phase != Phase::Install {
            return Vec::new();
        }

        let source = if self.source.is_empty() { "." } else { self.source.as_str() };
        let copy = Copy::new([source], self.effective_destination());
        vec![self.copy_instruction(copy)]
    }
}

/// Files needed to install dependencies, copied in the pre-install phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequirementsConfig(pub Vec<ArtifactsConfig>);

impl<'de> Deserialize<'de> for RequirementsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        shorthand::deserialize_with(deserializer, |source| ArtifactsConfig::local(&source))
            .map(RequirementsConfig)
    }
}

impl RequirementsConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactsConfig> {
        self.0.iter()
    }

    /// Variants the requirements are copied from.
    pub fn dependencies(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(ArtifactsConfig::dependency)
            .map(str::to_string)
            .collect()
    }
}

/// Directory a local requirement is copied into. Directories copy to
/// themselves, files to their parent directory.
fn grouping_key(artifact: &ArtifactsConfig) -> String {
    if !artifact.destination.is_empty() {
        return artifact.destination.clone();
    }
    if artifact.source.ends_with('/') {
        return artifact.source.clone();
    }
    match artifact.source.rfind('/') {
        Some(0) => "/".to_string(),
        Some(index) => format!("{}/", &artifact.source[..index]),
        None => "./".to_string(),
    }
}

impl PhaseCompileable for RequirementsConfig {
    fn instructions_for_phase(&self, phase: Phase, _layout: &Layout) -> Vec<Instruction> {
        if phase != Phase::PreInstall {
            return Vec::new();
        }

        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for artifact in self.0.iter().filter(|artifact| artifact.is_local()) {
            let key = grouping_key(artifact);
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, sources)) => sources.push(artifact.source.clone()),
                None => groups.push((key, vec![artifact.source.clone()])),
            }
        }

        let mut instructions: Vec<Instruction> = groups
            .into_iter()
            .map(|(destination, sources)| Instruction::Copy(Copy::new(sources, &destination)))
            .collect();

        for artifact in self.0.iter().filter(|artifact| !artifact.is_local()) {
            let source = if artifact.source.is_empty() { "./" } else { artifact.source.as_str() };
            let copy = Copy::new([source], artifact.effective_destination());
            instructions.push(artifact.copy_instruction(copy));
        }

        instructions
    }
}

/// Artifacts copied into the final image in the install phase. A bare
/// string names a variant to copy from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CopiesConfig(pub Vec<ArtifactsConfig>);

impl<'de> Deserialize<'de> for CopiesConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        shorthand::deserialize_with(deserializer, |from| ArtifactsConfig {
            from,
            ..ArtifactsConfig::default()
        })
        .map(CopiesConfig)
    }
}

impl CopiesConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactsConfig> {
        self.0.iter()
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(ArtifactsConfig::dependency)
            .map(str::to_string)
            .collect()
    }

    pub fn expand(&self, app_dir: &str, layout: &Layout) -> CopiesConfig {
        CopiesConfig(
            self.0
                .iter()
                .flat_map(|artifact| artifact.expand(app_dir, layout))
                .collect(),
        )
    }

    /// Drops existing entries that are redefined, then appends the new ones.
    pub fn merge(&mut self, other: &CopiesConfig) {
        self.0.retain(|artifact| !other.0.contains(artifact));
        self.0.extend(other.0.iter().cloned());
    }
}

impl PhaseCompileable for CopiesConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        self.0
            .iter()
            .flat_map(|artifact| artifact.instructions_for_phase(phase, layout))
            .collect()
    }
}
