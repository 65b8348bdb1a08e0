//! APT packages, proxies and sources.
//!
//! Everything APT-related is installed in the privileged phase as a handful
//! of files plus one chained `RUN`, so the package lists never end up in a
//! layer of their own.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use url::Url;

use super::shorthand;
use crate::build::{Instruction, Phase, PhaseCompileable, Run};
use crate::defaults::{Layout, APT_DEFAULT_TARGET};

/// Packages keyed by target release. A bare list targets the default
/// release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AptPackages(pub BTreeMap<String, Vec<String>>);

impl<'de> Deserialize<'de> for AptPackages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let packages = match Value::deserialize(deserializer)? {
            Value::Null => BTreeMap::new(),
            list @ Value::Sequence(_) => {
                let packages: Vec<String> = serde_yaml::from_value(list).map_err(D::Error::custom)?;
                BTreeMap::from([(APT_DEFAULT_TARGET.to_string(), packages)])
            }
            map @ Value::Mapping(_) => serde_yaml::from_value(map).map_err(D::Error::custom)?,
            _ => {
                return Err(D::Error::custom(
                    "expected a list of packages or a mapping of release to packages",
                ))
            }
        };
        Ok(AptPackages(packages))
    }
}

impl AptPackages {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

/// An HTTP(S) proxy, optionally limited to one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptProxy {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl AptProxy {
    /// The `Acquire::` line configuring this proxy.
    pub fn configuration(&self) -> String {
        let scheme_url = if self.source.is_empty() {
            &self.url
        } else {
            &self.source
        };
        let parsed = Url::parse(scheme_url).ok();
        let scheme = parsed.as_ref().map(Url::scheme).unwrap_or("http");

        let mut line = format!("Acquire::{}::Proxy", scheme);
        if !self.source.is_empty() {
            if let Some(host) = parsed.as_ref().and_then(Url::host_str) {
                line.push_str("::");
                line.push_str(host);
            }
        }
        line.push_str(&format!(" \"{}\";", self.url));
        line
    }
}

/// A proxy list, where a bare string is a proxy for every source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AptProxies(pub Vec<AptProxy>);

impl<'de> Deserialize<'de> for AptProxies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        shorthand::deserialize_with(deserializer, |url| AptProxy {
            url,
            source: String::new(),
        })
        .map(AptProxies)
    }
}

/// An additional APT source, optionally signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptSource {
    pub url: String,
    #[serde(default)]
    pub distribution: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// ASCII-armored public key the source is signed with.
    #[serde(rename = "signed-by", default, skip_serializing_if = "String::is_empty")]
    pub signed_by: String,
}

impl AptSource {
    /// Keyring location, named after the key's SHA-256 digest.
    pub fn keyring_path(&self, layout: &Layout) -> String {
        let digest = Sha256::digest(self.signed_by.as_bytes());
        format!(
            "{}/{}.asc",
            layout.apt_keyring_dir.trim_end_matches('/'),
            hex::encode(digest)
        )
    }

    /// The `deb` line for the sources list.
    pub fn configuration(&self, layout: &Layout) -> String {
        let mut line = "deb".to_string();
        if !self.signed_by.is_empty() {
            line.push_str(&format!(" [signed-by={}]", self.keyring_path(layout)));
        }

        let mut fields = vec![self.url.as_str(), self.distribution.as_str()];
        fields.extend(self.components.iter().map(String::as_str));
        format!("{} {}", line, fields.join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptConfig {
    #[serde(default, skip_serializing_if = "AptPackages::is_empty")]
    pub packages: AptPackages,
    #[serde(default, skip_serializing_if = "AptProxies::is_empty")]
    pub proxies: AptProxies,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<AptSource>,
}

impl AptProxies {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AptConfig {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.proxies.is_empty() && self.sources.is_empty()
    }

    /// Appends packages per release, proxies and sources. Entries already
    /// present are not repeated.
    pub fn merge(&mut self, other: &AptConfig) {
        // skipping present entries keeps expansion idempotent
        for (target, packages) in &other.packages.0 {
            let existing = self.packages.0.entry(target.clone()).or_default();
            append_missing(existing, packages);
        }
        append_missing(&mut self.proxies.0, &other.proxies.0);
        append_missing(&mut self.sources, &other.sources);
    }
}

fn append_missing<T: Clone + PartialEq>(existing: &mut Vec<T>, new: &[T]) {
    for entry in new {
        if !existing.contains(entry) {
            existing.push(entry.clone());
        }
    }
}

impl PhaseCompileable for AptConfig {
    fn instructions_for_phase(&self, phase: Phase, layout: &Layout) -> Vec<Instruction> {
        if phase != Phase::Privileged || self.is_empty() {
            return Vec::new();
        }

        let mut instructions = vec![Instruction::env([("DEBIAN_FRONTEND", "noninteractive")])];

        if !self.proxies.is_empty() {
            let lines: Vec<String> = self.proxies.0.iter().map(AptProxy::configuration).collect();
            instructions.push(Instruction::File {
                path: layout.apt_proxy_path.clone(),
                content: format!("{}\n", lines.join("\n")),
                mode: layout.apt_file_mode,
            });
        }

        let mut sources = Vec::new();
        for source in &self.sources {
            sources.push(source.configuration(layout));
            if !source.signed_by.is_empty() {
                instructions.push(Instruction::File {
                    path: source.keyring_path(layout),
                    content: source.signed_by.clone(),
                    mode: layout.apt_file_mode,
                });
            }
        }

        if !sources.is_empty() {
            instructions.push(Instruction::RunAll(vec![
                Run::new("apt-get update", Vec::<String>::new()),
                Run::new("apt-get install -y", ["ca-certificates"]),
            ]));
            instructions.push(Instruction::File {
                path: layout.apt_sources_path.clone(),
                content: format!("{}\n", sources.join("\n")),
                mode: layout.apt_file_mode,
            });
        }

        let mut runs = Vec::new();
        let targets: Vec<(&String, &Vec<String>)> = self
            .packages
            .0
            .iter()
            .filter(|(_, packages)| !packages.is_empty())
            .collect();

        if !targets.is_empty() {
            runs.push(Run::new("apt-get update", Vec::<String>::new()));
        }

        for (target, packages) in targets {
            if target == APT_DEFAULT_TARGET {
                runs.push(Run::new("apt-get install -y", packages.iter().cloned()));
            } else {
                let arguments = std::iter::once(target.clone()).chain(packages.iter().cloned());
                runs.push(Run::new("apt-get install -y -t", arguments));
            }
        }

        runs.push(Run::new("rm -rf /var/lib/apt/lists/*", Vec::<String>::new()));

        if !self.proxies.is_empty() {
            runs.push(Run::new("rm -f", [layout.apt_proxy_path.as_str()]));
        }

        instructions.push(Instruction::RunAll(runs));
        instructions
    }
}
