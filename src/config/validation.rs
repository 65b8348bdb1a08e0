//! # Configuration Validation
//!
//! Checks a parsed [`Config`] and reports every problem at once as a
//! [`ValidationErrors`] batch. Each problem is addressed by the dotted path
//! of the offending field from the document root, for example
//! `variants.production.copies[0].from`.
//!
//! Validation runs on the document as written, before any expansion, so a
//! problem is reported once where it is declared rather than once per
//! variant that inherits it. The exception is mutually exclusive fields: a
//! variant can inherit one of them and declare the other, so those are also
//! checked on each expanded variant and reported under the variant when no
//! single declaration already conflicts. Variants are checked in parallel
//! and their problems are reported in variant-name order.

use std::collections::HashSet;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use url::Url;

use super::artifacts::ArtifactsConfig;
use super::builder::{BuilderConfig, BuilderEntry, BuildersConfig};
use super::mounts::{CachesConfig, MountsConfig};
use super::node::NodeConfig;
use super::python::PythonConfig;
use super::{CommonConfig, Config, RequirementsConfig};
use crate::build::target::is_image_reference;
use crate::defaults::{APT_DEFAULT_TARGET, CURRENT_VERSION, LOCAL_ARTIFACT_KEYWORD};
use crate::error::{Result, ValidationErrors};

static VARIANT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-\.]+[a-zA-Z0-9]$").expect("Invalid variant name regex")
});

static ENVIRONMENT_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]+$").expect("Invalid environment variable regex")
});

static DEBIAN_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[a-z0-9][a-z0-9+.\-]+",
        r"(?:=(?:[0-9]+:)?[0-9]+[a-zA-Z0-9\.\+\-~]*|/[a-zA-Z](?:[a-zA-Z0-9\-]*[a-zA-Z0-9]+)?)?$",
    ))
    .expect("Invalid Debian package regex")
});

static DEBIAN_RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z](?:[a-zA-Z0-9\-]*[a-zA-Z0-9]+)?$").expect("Invalid Debian release regex")
});

static DEBIAN_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9+./\-]+$").expect("Invalid Debian component regex"));

static PYTHON_CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:<|<=|!=|==|>=|>|~=)[a-zA-Z0-9\-_\.\*\+!]+",
        r"(?:,(?:<|<=|!=|==|>=|>|~=)[a-zA-Z0-9\-_\.\*\+!]+)*$",
    ))
    .expect("Invalid Python constraint regex")
});

// RFC 952 host names
static USER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]([a-zA-Z0-9\-]+[\.]?)*[a-zA-Z0-9]$").expect("Invalid user name regex")
});

const CACHE_ACCESS_MODES: [&str; 3] = ["shared", "private", "locked"];

const COMMAND_EXCLUSIVE: &str = "is not allowed if any of field(s) \"script\" is declared/included";
const SCRIPT_EXCLUSIVE: &str = "is not allowed if any of field(s) \"command\" is declared/included";
const BUILDERS_EXCLUSIVE: &str =
    "is not allowed if any of field(s) \"node python builder\" is declared/included";

/// Whether `name` is a valid variant name.
pub fn is_variant_name(name: &str) -> bool {
    VARIANT_NAME.is_match(name)
}

/// Validates the whole document, failing with every problem found.
pub fn validate(config: &Config) -> Result<()> {
    problems(config).into_result()
}

/// Collects every problem in the document.
pub fn problems(config: &Config) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if config.version.is_empty() {
        errors.push("version", "is required");
    } else if config.version != CURRENT_VERSION {
        errors.push("version", format!("config version \"{}\" is unsupported", config.version));
    }

    if !config.variants.keys().all(|name| is_variant_name(name)) {
        errors.push("variants", "contains a bad variant name");
    }

    let mut root = Checker::new(config);
    root.common("", &config.common);
    errors.extend(root.errors);

    let per_variant: Vec<ValidationErrors> = config
        .variants
        .par_iter()
        .map(|(name, variant)| {
            let prefix = format!("variants.{}", name);
            let mut checker = Checker::new(config);

            for (index, include) in variant.includes.iter().enumerate() {
                if !config.has_variant(include) {
                    checker.push(
                        &format!("{}.includes[{}]", prefix, index),
                        format!("references an unknown variant \"{}\"", include),
                    );
                }
            }

            for (index, artifact) in variant.copies.iter().enumerate() {
                checker.artifact(&format!("{}.copies[{}]", prefix, index), artifact);
            }

            checker.common(&prefix, &variant.common);
            checker.inherited(name, &prefix);
            checker.errors
        })
        .collect();

    for variant_errors in per_variant {
        errors.extend(variant_errors);
    }

    errors
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// Lexically cleans an absolute or relative slash-separated path.
fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

fn is_absolute_non_root(path: &str) -> bool {
    path.starts_with('/') && clean_path(path) != "/"
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or(false)
}

fn is_user_name(value: &str) -> bool {
    value != "root" && USER_NAME.is_match(value)
}

fn has_command_and_script(common: &CommonConfig) -> bool {
    common
        .builder
        .as_ref()
        .is_some_and(|builder| builder.has_command() && builder.has_script())
}

fn has_builders_and_fragments(common: &CommonConfig) -> bool {
    common.builders.as_ref().is_some_and(|builders| !builders.0.is_empty())
        && (common.node.is_some() || common.python.is_some() || common.builder.is_some())
}

fn has_duplicates<T: PartialEq>(entries: &[T]) -> bool {
    entries
        .iter()
        .enumerate()
        .any(|(index, entry)| entries[..index].contains(entry))
}

struct Checker<'a> {
    config: &'a Config,
    errors: ValidationErrors,
}

impl<'a> Checker<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            config,
            errors: ValidationErrors::new(),
        }
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(field, message);
    }

    fn is_context(&self, reference: &str) -> bool {
        self.config.has_variant(reference) || is_image_reference(reference)
    }

    fn common(&mut self, prefix: &str, common: &CommonConfig) {
        if !common.base.is_empty() && !self.is_context(&common.base) {
            self.push(
                &join(prefix, "base"),
                format!("\"{}\" is not a valid image reference or known variant", common.base),
            );
        }

        if !common.arguments.0.keys().all(|name| ENVIRONMENT_VARIABLE.is_match(name)) {
            self.push(&join(prefix, "arguments"), "contains invalid environment variable names");
        }

        self.apt(&join(prefix, "apt"), common);

        if let Some(builders) = &common.builders {
            self.builders(prefix, builders, common);
        }
        if let Some(node) = &common.node {
            self.node(&join(prefix, "node"), node);
        }
        if let Some(python) = &common.python {
            self.python(&join(prefix, "python"), python);
        }
        if let Some(builder) = &common.builder {
            self.builder(&join(prefix, "builder"), builder);
        }

        let lives = &common.lives;
        if !lives.user.as_.is_empty() && !is_user_name(&lives.user.as_) {
            self.push(
                &join(prefix, "lives.as"),
                format!("\"{}\" is not a valid user name", lives.user.as_),
            );
        }
        if !lives.in_.is_empty() && !is_absolute_non_root(&lives.in_) {
            self.push(
                &join(prefix, "lives.in"),
                format!("\"{}\" is not a valid absolute non-root path", lives.in_),
            );
        }

        let runs = &common.runs;
        if !runs.user.as_.is_empty() && !is_user_name(&runs.user.as_) {
            self.push(
                &join(prefix, "runs.as"),
                format!("\"{}\" is not a valid user name", runs.user.as_),
            );
        }
        if !runs.in_.is_empty() && !is_absolute_non_root(&runs.in_) {
            self.push(
                &join(prefix, "runs.in"),
                format!("\"{}\" is not a valid absolute non-root path", runs.in_),
            );
        }
        if !runs.environment.keys().all(|name| ENVIRONMENT_VARIABLE.is_match(name)) {
            self.push(&join(prefix, "runs.environment"), "contains invalid environment variable names");
        }
    }

    fn apt(&mut self, prefix: &str, common: &CommonConfig) {
        let apt = &common.apt;

        for (target, packages) in &apt.packages.0 {
            let field = format!("{}.packages.{}", prefix, target);
            if target != APT_DEFAULT_TARGET && !DEBIAN_RELEASE.is_match(target) {
                self.push(&field, format!("\"{}\" is not a valid Debian release name", target));
            }
            for (index, package) in packages.iter().enumerate() {
                if !DEBIAN_PACKAGE.is_match(package) {
                    self.push(
                        &format!("{}[{}]", field, index),
                        format!("\"{}\" is not a valid Debian package name", package),
                    );
                }
            }
        }

        for (index, proxy) in apt.proxies.0.iter().enumerate() {
            let field = format!("{}.proxies[{}]", prefix, index);
            if proxy.url.is_empty() {
                self.push(&join(&field, "url"), "is required");
            } else if !is_http_url(&proxy.url) {
                self.push(
                    &join(&field, "url"),
                    format!("\"{}\" is not a valid HTTP/HTTPS URL", proxy.url),
                );
            }
            if !proxy.source.is_empty() && !is_http_url(&proxy.source) {
                self.push(
                    &join(&field, "source"),
                    format!("\"{}\" is not a valid HTTP/HTTPS URL", proxy.source),
                );
            }
        }

        for (index, source) in apt.sources.iter().enumerate() {
            let field = format!("{}.sources[{}]", prefix, index);
            if source.url.is_empty() {
                self.push(&join(&field, "url"), "is required");
            } else if !is_http_url(&source.url) {
                self.push(
                    &join(&field, "url"),
                    format!("\"{}\" is not a valid HTTP/HTTPS URL", source.url),
                );
            }
            if source.distribution.is_empty() {
                self.push(&join(&field, "distribution"), "is required");
            } else if !DEBIAN_RELEASE.is_match(&source.distribution) {
                self.push(
                    &join(&field, "distribution"),
                    format!("\"{}\" is not a valid Debian release name", source.distribution),
                );
            }
            for (position, component) in source.components.iter().enumerate() {
                if !DEBIAN_COMPONENT.is_match(component) {
                    self.push(
                        &format!("{}.components[{}]", field, position),
                        format!("\"{}\" is not a valid Debian component name", component),
                    );
                }
            }
        }
    }

    fn artifact(&mut self, field: &str, artifact: &ArtifactsConfig) {
        if artifact.from.is_empty() {
            self.push(&join(field, "from"), "is required");
        } else if artifact.from != LOCAL_ARTIFACT_KEYWORD && !self.is_context(&artifact.from) {
            self.push(
                &join(field, "from"),
                format!("\"{}\" is not a valid image reference or known variant", artifact.from),
            );
        }

        if artifact.is_local() && !artifact.source.is_empty() {
            let cleaned = clean_path(&artifact.source);
            if artifact.source.starts_with('/') || cleaned.starts_with("..") {
                self.push(&join(field, "source"), "path must be relative when \"from\" is \"local\"");
            }
        }
    }

    fn requirements(&mut self, field: &str, requirements: &RequirementsConfig) {
        if has_duplicates(&requirements.0) {
            self.push(field, "cannot contain duplicates");
        }
        for (index, artifact) in requirements.iter().enumerate() {
            self.artifact(&format!("{}[{}]", field, index), artifact);
        }
    }

    fn mounts(&mut self, field: &str, mounts: &MountsConfig) {
        if has_duplicates(&mounts.0) {
            self.push(field, "cannot contain duplicates");
        }
        for (index, mount) in mounts.0.iter().enumerate() {
            let entry = format!("{}[{}]", field, index);
            if mount.destination.is_empty() {
                self.push(&join(&entry, "destination"), "is required");
            }
            if mount.from.is_empty() {
                self.push(&join(&entry, "from"), "is required");
            } else if mount.from != LOCAL_ARTIFACT_KEYWORD && !self.is_context(&mount.from) {
                self.push(
                    &join(&entry, "from"),
                    format!("\"{}\" is not a valid image reference or known variant", mount.from),
                );
            }
        }
    }

    fn caches(&mut self, field: &str, caches: &CachesConfig) {
        if has_duplicates(&caches.0) {
            self.push(field, "cannot contain duplicates");
        }
        for (index, cache) in caches.0.iter().enumerate() {
            let entry = format!("{}[{}]", field, index);
            if cache.destination.is_empty() {
                self.push(&join(&entry, "destination"), "is required");
            }
            if !cache.access.is_empty() && !CACHE_ACCESS_MODES.contains(&cache.access.as_str()) {
                self.push(
                    &join(&entry, "access"),
                    format!("\"{}\" is not a valid cache access mode", cache.access),
                );
            }
        }
    }

    fn command_and_script(&mut self, prefix: &str) {
        self.push(&join(prefix, "command"), COMMAND_EXCLUSIVE);
        self.push(&join(prefix, "script"), SCRIPT_EXCLUSIVE);
    }

    /// Exclusive fields that only conflict once the root, the includes and
    /// the variant itself are merged.
    fn inherited(&mut self, name: &str, prefix: &str) {
        let config = self.config;

        // unknown includes and include cycles are reported elsewhere
        let Ok(includes) = config.includes_graph().get_deps(name) else {
            return;
        };
        let Ok(expanded) = config.expand(name) else {
            return;
        };

        let declared: Vec<&CommonConfig> = std::iter::once(&config.common)
            .chain(
                includes
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(name))
                    .filter_map(|include| config.variants.get(include))
                    .map(|variant| &variant.common),
            )
            .collect();

        if has_command_and_script(&expanded.common)
            && !declared.iter().any(|common| has_command_and_script(common))
        {
            self.command_and_script(&join(prefix, "builder"));
        }
        if has_builders_and_fragments(&expanded.common)
            && !declared.iter().any(|common| has_builders_and_fragments(common))
        {
            self.push(&join(prefix, "builders"), BUILDERS_EXCLUSIVE);
        }
    }

    fn builder(&mut self, prefix: &str, builder: &BuilderConfig) {
        if builder.has_command() && builder.has_script() {
            self.command_and_script(prefix);
        }

        if let Some(requirements) = &builder.requirements {
            self.requirements(&join(prefix, "requirements"), requirements);
        }
        if let Some(mounts) = &builder.mounts {
            self.mounts(&join(prefix, "mounts"), mounts);
        }
        if let Some(caches) = &builder.caches {
            self.caches(&join(prefix, "caches"), caches);
        }

        let has_inputs = builder.requirements.as_ref().is_some_and(|r| !r.is_empty())
            || builder.mounts.as_ref().is_some_and(|m| !m.is_empty())
            || builder.caches.as_ref().is_some_and(|c| !c.is_empty());
        if has_inputs && !builder.has_command() && !builder.has_script() {
            log::warn!("{}: declares inputs but neither a command nor a script", prefix);
        }
    }

    fn builders(&mut self, prefix: &str, builders: &BuildersConfig, common: &CommonConfig) {
        let field = join(prefix, "builders");

        let mut seen = HashSet::new();
        let repeated = builders
            .iter()
            .filter(|entry| !matches!(entry, BuilderEntry::Custom(_)))
            .any(|entry| !seen.insert(entry.key()));
        if repeated {
            self.push(&field, "contains disallowed repetitions of entries");
        }

        if has_builders_and_fragments(common) {
            self.push(&field, BUILDERS_EXCLUSIVE);
        }

        for (index, entry) in builders.iter().enumerate() {
            let entry_prefix = format!("{}[{}].{}", field, index, entry.key());
            match entry {
                BuilderEntry::Custom(builder) => self.builder(&entry_prefix, builder),
                BuilderEntry::Node(node) => self.node(&entry_prefix, node),
                BuilderEntry::Python(python) => self.python(&entry_prefix, python),
            }
        }
    }

    fn node(&mut self, prefix: &str, node: &NodeConfig) {
        if !node.env.is_empty() && !node.env.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.push(
                &join(prefix, "env"),
                format!("\"{}\" is not a valid Node environment name", node.env),
            );
        }
        if let Some(requirements) = &node.requirements {
            self.requirements(&join(prefix, "requirements"), requirements);
        }
    }

    fn python(&mut self, prefix: &str, python: &PythonConfig) {
        if let Some(requirements) = &python.requirements {
            self.requirements(&join(prefix, "requirements"), requirements);
        }
        for (field, version) in [("poetry.version", &python.poetry.version), ("uv.version", &python.uv.version)] {
            if !version.is_empty() && !PYTHON_CONSTRAINT.is_match(version) {
                self.push(
                    &join(prefix, field),
                    format!("\"{}\" is not a valid Python package version specification", version),
                );
            }
        }
    }
}
