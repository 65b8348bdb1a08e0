//! Build targets and named-context resolution.
//!
//! A [`Target`] is the compiled representation of one variant: the ordered
//! build-graph operations produced by its instructions, the resulting image
//! configuration, and the other targets it referenced along the way.
//!
//! Targets never resolve names on their own. Whenever an instruction refers
//! to another build context (a copy source, a mount, the base image) the
//! target asks a [`ContextLookup`], which the orchestrator implements by
//! consulting the client's [`NamedContextResolver`] first and compiling a
//! variant second.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::{Serialize, Serializer};

use super::run_option::Mount;
use crate::defaults::Layout;
use crate::error::{Error, Result};

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("Invalid environment reference regex")
});

// registry[:port]/path[:tag][@digest]
static IMAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?(?::[0-9]+)?/)?",
        r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*",
        r"(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*",
        r"(?::[\w][\w.-]{0,127})?",
        r"(?:@[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,})?$",
    ))
    .expect("Invalid image reference regex")
});

/// Whether `value` is a syntactically valid image reference.
pub fn is_image_reference(value: &str) -> bool {
    IMAGE_REFERENCE.is_match(value)
}

/// Target platform of a compilation, e.g. `linux/amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            os: "linux".to_string(),
            architecture: "amd64".to_string(),
            variant: None,
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => {
                Ok(Self {
                    os: os.to_string(),
                    architecture: arch.to_string(),
                    variant: Some(variant.to_string()),
                })
            }
            _ => Err(Error::ConfigParse {
                message: format!("invalid platform \"{}\"", value),
                hint: Some("Use the form os/arch or os/arch/variant, e.g. linux/amd64".to_string()),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// Options passed along with a named-context request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOpt {
    pub platform: Option<Platform>,
}

/// A resolved build context.
#[derive(Debug, Clone)]
pub enum Context {
    /// An empty filesystem.
    Scratch,
    /// The local build context supplied by the client.
    Local,
    /// A registry image reference.
    Image(String),
    /// The output of another compiled variant.
    Stage(Arc<Target>),
    /// An opaque context supplied by the client under the given name.
    Client(String),
}

impl Context {
    /// The name used when referring to this context in rendered output.
    pub fn reference(&self) -> &str {
        match self {
            Context::Scratch => "scratch",
            Context::Local => "local",
            Context::Image(reference) => reference,
            Context::Stage(target) => target.name(),
            Context::Client(name) => name,
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Context::Scratch, Context::Scratch) | (Context::Local, Context::Local) => true,
            (Context::Image(a), Context::Image(b)) | (Context::Client(a), Context::Client(b)) => {
                a == b
            }
            (Context::Stage(a), Context::Stage(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            _ => false,
        }
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(tag = "type", content = "name", rename_all = "lowercase")]
        enum Reference<'a> {
            Scratch,
            Local,
            Image(&'a str),
            Stage(&'a str),
            Client(&'a str),
        }

        let reference = match self {
            Context::Scratch => Reference::Scratch,
            Context::Local => Reference::Local,
            Context::Image(image) => Reference::Image(image),
            Context::Stage(target) => Reference::Stage(target.name()),
            Context::Client(name) => Reference::Client(name),
        };
        reference.serialize(serializer)
    }
}

/// Client-provided hook that may claim a named context before it falls back
/// to variant compilation.
///
/// Returning `Ok(None)` means the client does not know the name.
pub trait NamedContextResolver: Send + Sync {
    fn resolve(&self, name: &str, opt: &ContextOpt) -> Result<Option<Context>>;
}

impl<F> NamedContextResolver for F
where
    F: Fn(&str, &ContextOpt) -> Result<Option<Context>> + Send + Sync,
{
    fn resolve(&self, name: &str, opt: &ContextOpt) -> Result<Option<Context>> {
        self(name, opt)
    }
}

/// Resolves names to contexts while a target is being compiled.
pub trait ContextLookup {
    fn named_context(&self, name: &str) -> Result<Context>;
}

/// Owner applied to copied files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chown {
    pub uid: u32,
    pub gid: u32,
}

/// One operation in a target's build-graph state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Op {
    From {
        stage: String,
        base: Context,
    },
    Arg {
        name: String,
        default: String,
    },
    Env {
        name: String,
        value: String,
    },
    Label {
        name: String,
        value: String,
    },
    Run {
        command: String,
        mounts: Vec<Mount>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    Script {
        script: String,
        mounts: Vec<Mount>,
    },
    Copy {
        from: Context,
        sources: Vec<String>,
        destination: String,
        chown: Option<Chown>,
    },
    File {
        path: String,
        content: String,
        mode: u32,
    },
    Workdir {
        path: String,
    },
    User {
        user: String,
    },
    Entrypoint {
        args: Vec<String>,
    },
}

/// Runtime configuration of the image a target produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageConfig {
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub entrypoint: Vec<String>,
}

/// The compiled build-graph state of one variant.
#[derive(Debug, Serialize)]
pub struct Target {
    name: String,
    #[serde(skip)]
    platform: Platform,
    base_ref: Option<String>,
    base: Context,
    ops: Vec<Op>,
    image: ImageConfig,
    #[serde(skip)]
    args: BTreeMap<String, String>,
    #[serde(skip)]
    dependencies: Vec<Arc<Target>>,
    #[serde(skip)]
    layout: Layout,
    #[serde(skip)]
    name_log_width: usize,
}

impl Target {
    pub fn new(name: &str, base_ref: Option<&str>, layout: Layout, name_log_width: usize) -> Self {
        Self {
            name: name.to_string(),
            platform: Platform::default(),
            base_ref: base_ref.filter(|base| !base.is_empty()).map(str::to_string),
            base: Context::Scratch,
            ops: Vec::new(),
            image: ImageConfig::default(),
            args: BTreeMap::new(),
            dependencies: Vec::new(),
            layout,
            name_log_width,
        }
    }

    /// Sets the platform this target is compiled for.
    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Resolves the base reference into the initial build-graph state.
    pub fn initialize(&mut self, contexts: &dyn ContextLookup) -> Result<()> {
        self.base = match self.base_ref.clone() {
            Some(base_ref) => self.resolve(&base_ref, contexts)?,
            None => Context::Scratch,
        };

        if let Context::Stage(base) = &self.base {
            // Inherit the runtime configuration of a variant base
            self.image = base.image.clone();
        }

        log::debug!("{}", self.describe(&format!("initialized from {}", self.base.reference())));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn base(&self) -> &Context {
        &self.base
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn image(&self) -> &ImageConfig {
        &self.image
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Targets referenced directly by this one, in first-reference order.
    pub fn dependencies(&self) -> &[Arc<Target>] {
        &self.dependencies
    }

    /// Prefixes a message with this target's padded name for log output.
    pub fn describe(&self, message: &str) -> String {
        format!("[{:<width$}] {}", self.name, message, width = self.name_log_width)
    }

    /// Expands `$NAME` and `${NAME}` using build arguments and environment
    /// set so far. Unknown references are left untouched.
    pub fn expand_env(&self, value: &str) -> String {
        ENV_REFERENCE
            .replace_all(value, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                self.image
                    .env
                    .get(name)
                    .or_else(|| self.args.get(name))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Resolves a named context, recording stage references as dependencies.
    pub fn resolve(&mut self, name: &str, contexts: &dyn ContextLookup) -> Result<Context> {
        let context = contexts.named_context(name)?;
        if let Context::Stage(target) = &context {
            if !self.dependencies.iter().any(|dep| Arc::ptr_eq(dep, target)) {
                self.dependencies.push(Arc::clone(target));
            }
        }
        Ok(context)
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn add_arg(&mut self, name: &str, default: &str) {
        self.args.insert(name.to_string(), default.to_string());
        self.push(Op::Arg {
            name: name.to_string(),
            default: default.to_string(),
        });
    }

    pub fn add_env(&mut self, name: &str, value: &str) {
        let expanded = self.expand_env(value);
        self.image.env.insert(name.to_string(), expanded);
        self.push(Op::Env {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn add_label(&mut self, name: &str, value: &str) {
        self.image.labels.insert(name.to_string(), value.to_string());
        self.push(Op::Label {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn set_working_dir(&mut self, path: &str) {
        let path = self.expand_env(path);
        self.image.working_dir = Some(path.clone());
        self.push(Op::Workdir { path });
    }

    pub fn set_user(&mut self, user: &str) {
        let user = self.expand_env(user);
        self.image.user = Some(user.clone());
        self.push(Op::User { user });
    }

    pub fn set_entrypoint(&mut self, args: &[String]) {
        self.image.entrypoint = args.to_vec();
        self.push(Op::Entrypoint {
            args: args.to_vec(),
        });
    }

    /// Runs the configured entrypoint with extra arguments and environment as
    /// a final build step. Does nothing when no entrypoint is set.
    pub fn run_entrypoint(&mut self, args: &[String], env: &BTreeMap<String, String>) {
        if self.image.entrypoint.is_empty() {
            log::warn!("{}", self.describe("run requested but no entrypoint is set"));
            return;
        }

        let command = self
            .image
            .entrypoint
            .iter()
            .chain(args)
            .map(|arg| super::instruction::quote(arg))
            .collect::<Vec<_>>()
            .join(" ");

        self.push(Op::Run {
            command,
            mounts: Vec::new(),
            env: env.clone(),
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Resolves only the local context.
    pub(crate) struct LocalOnly;

    impl ContextLookup for LocalOnly {
        fn named_context(&self, name: &str) -> Result<Context> {
            match name {
                "local" => Ok(Context::Local),
                other => Err(Error::NamedContext {
                    name: other.to_string(),
                    message: "no such context".to_string(),
                }),
            }
        }
    }

    /// Resolves from a fixed table, then local.
    pub(crate) struct StaticContexts {
        pub contexts: BTreeMap<String, Context>,
    }

    impl StaticContexts {
        pub(crate) fn with_image(name: &str, image: &str) -> Self {
            let mut contexts = BTreeMap::new();
            contexts.insert(name.to_string(), Context::Image(image.to_string()));
            Self { contexts }
        }

        pub(crate) fn with_stage(name: &str, target: Target) -> Self {
            let mut contexts = BTreeMap::new();
            contexts.insert(name.to_string(), Context::Stage(Arc::new(target)));
            Self { contexts }
        }
    }

    impl ContextLookup for StaticContexts {
        fn named_context(&self, name: &str) -> Result<Context> {
            match self.contexts.get(name) {
                Some(context) => Ok(context.clone()),
                None => LocalOnly.named_context(name),
            }
        }
    }

    #[test]
    fn test_platform_parse_and_display() {
        let platform: Platform = "linux/arm64/v8".parse().unwrap();
        assert_eq!(platform.os, "linux");
        assert_eq!(platform.architecture, "arm64");
        assert_eq!(platform.variant.as_deref(), Some("v8"));
        assert_eq!(platform.to_string(), "linux/arm64/v8");

        assert!("linux".parse::<Platform>().is_err());
        assert!("linux//".parse::<Platform>().is_err());
    }

    #[test]
    fn test_target_platform() {
        let target = Target::new("build", Some("debian"), Layout::default(), 0);
        assert_eq!(target.platform(), &Platform::default());

        let arm64: Platform = "linux/arm64".parse().unwrap();
        let target = target.for_platform(arm64.clone());
        assert_eq!(target.platform(), &arm64);
    }

    #[test]
    fn test_expand_env_uses_args_and_env() {
        let mut target = Target::new("build", Some("debian"), Layout::default(), 0);
        target.add_arg("LIVES_AS", "somebody");
        target.add_env("HOME", "/home/$LIVES_AS");

        assert_eq!(target.expand_env("${HOME}/.cache"), "/home/somebody/.cache");
        assert_eq!(target.expand_env("$LIVES_AS:$MISSING"), "somebody:$MISSING");
        assert_eq!(target.image().env["HOME"], "/home/somebody");
    }

    #[test]
    fn test_initialize_scratch_without_base() {
        let mut target = Target::new("assets", None, Layout::default(), 0);
        target.initialize(&LocalOnly).unwrap();
        assert_eq!(target.base(), &Context::Scratch);
        assert!(target.dependencies().is_empty());
    }

    #[test]
    fn test_initialize_stage_base_records_dependency() {
        let mut base = Target::new("build", Some("debian"), Layout::default(), 0);
        base.set_working_dir("/srv/app");
        let contexts = StaticContexts::with_stage("build", base);

        let mut target = Target::new("test", Some("build"), Layout::default(), 0);
        target.initialize(&contexts).unwrap();

        assert_eq!(target.base().reference(), "build");
        assert_eq!(target.dependencies().len(), 1);
        assert_eq!(target.image().working_dir.as_deref(), Some("/srv/app"));
    }

    #[test]
    fn test_initialize_propagates_resolution_errors() {
        let mut target = Target::new("test", Some("nowhere"), Layout::default(), 0);
        match target.initialize(&LocalOnly) {
            Err(Error::NamedContext { name, .. }) => assert_eq!(name, "nowhere"),
            other => panic!("Expected NamedContext error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_image_reference() {
        assert!(is_image_reference("debian"));
        assert!(is_image_reference("debian:bookworm"));
        assert!(is_image_reference("docker-registry.example:5000/team/app:1.2.3"));
        assert!(is_image_reference(
            "debian@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
        ));
        assert!(!is_image_reference("Debian"));
        assert!(!is_image_reference("foo bar"));
        assert!(!is_image_reference(""));
    }

    #[test]
    fn test_describe_pads_name() {
        let target = Target::new("app", None, Layout::default(), 6);
        assert_eq!(target.describe("done"), "[app   ] done");
    }

    #[test]
    fn test_run_entrypoint() {
        let mut target = Target::new("test", Some("debian"), Layout::default(), 0);
        target.run_entrypoint(&["ignored".to_string()], &BTreeMap::new());
        assert!(target.ops().is_empty());

        target.set_entrypoint(&["make".to_string(), "test".to_string()]);
        let mut env = BTreeMap::new();
        env.insert("CI".to_string(), "1".to_string());
        target.run_entrypoint(&["-j4".to_string()], &env);

        match target.ops().last() {
            Some(Op::Run { command, env, .. }) => {
                assert_eq!(command, r#""make" "test" "-j4""#);
                assert_eq!(env["CI"], "1");
            }
            other => panic!("Expected Run op, got {:?}", other),
        }
    }
}
