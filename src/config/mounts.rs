//! Mounts attached to builder commands: read-only source mounts and
//! persistent cache mounts.

use serde::{Deserialize, Deserializer, Serialize};

use super::shorthand;
use super::validation::is_variant_name;
use crate::build::{CacheMount, RunOption, SourceMount};
use crate::defaults::LOCAL_ARTIFACT_KEYWORD;

/// Mounts `source` of a context at `destination` while a builder runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl MountConfig {
    /// The variant mounted, if `from` names one.
    pub fn dependency(&self) -> Option<&str> {
        if self.from != LOCAL_ARTIFACT_KEYWORD && is_variant_name(&self.from) {
            Some(&self.from)
        } else {
            None
        }
    }

    pub fn run_option(&self) -> RunOption {
        RunOption::SourceMount(SourceMount {
            from: self.from.clone(),
            destination: self.destination.clone(),
            source: self.source.clone(),
            readonly: true,
        })
    }
}

/// A bare string mounts the build context at that destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MountsConfig(pub Vec<MountConfig>);

impl<'de> Deserialize<'de> for MountsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        shorthand::deserialize_with(deserializer, |destination| MountConfig {
            from: LOCAL_ARTIFACT_KEYWORD.to_string(),
            destination,
            source: String::new(),
        })
        .map(MountsConfig)
    }
}

impl MountsConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(MountConfig::dependency)
            .map(str::to_string)
            .collect()
    }

    pub fn run_options(&self) -> Vec<RunOption> {
        self.0.iter().map(MountConfig::run_option).collect()
    }
}

/// A persistent cache owned by the `lives` account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// `shared`, `private` or `locked`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access: String,
}

impl CacheConfig {
    pub fn run_option(&self) -> RunOption {
        RunOption::CacheMount(CacheMount {
            destination: self.destination.clone(),
            id: self.id.clone(),
            access: self.access.clone(),
            uid: "$LIVES_UID".to_string(),
            gid: "$LIVES_GID".to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CachesConfig(pub Vec<CacheConfig>);

impl<'de> Deserialize<'de> for CachesConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        shorthand::deserialize_with(deserializer, |destination| CacheConfig {
            destination,
            ..CacheConfig::default()
        })
        .map(CachesConfig)
    }
}

impl CachesConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn run_options(&self) -> Vec<RunOption> {
        self.0.iter().map(CacheConfig::run_option).collect()
    }
}
