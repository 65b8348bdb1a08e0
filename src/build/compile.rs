//! Target orchestration.
//!
//! [`Compiler::compile`] compiles the requested root variant and, on demand,
//! every variant it references through its base, copies, or mounts. Each
//! variant is compiled at most once per platform and [`Compiler`], even when
//! the same platform is requested from different threads at the same time;
//! the memo table lives in [`TargetCache`]. Targets compiled for different
//! platforms are never shared.
//!
//! Named contexts are resolved in this order:
//!
//! 1. the client's [`NamedContextResolver`], if any;
//! 2. `local`, the client's build context;
//! 3. a known variant, compiled through the memo table;
//! 4. a syntactically valid image reference.
//!
//! Anything else is an [`Error::NamedContext`].

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::target::{
    is_image_reference, Context, ContextLookup, ContextOpt, NamedContextResolver, Platform, Target,
};
use super::{instructions_in_order, TargetCompileable};
use crate::cache::{CacheKey, TargetCache};
use crate::defaults::{Layout, LOCAL_ARTIFACT_KEYWORD};
use crate::error::{Error, Result};

/// Extra build option enabling a final run of the root variant's entrypoint.
pub const OPTION_RUN_VARIANT: &str = "run-variant";
/// Extra build option holding a JSON list of entrypoint arguments.
pub const OPTION_ENTRYPOINT_ARGS: &str = "entrypoint-args";
/// Extra build option holding a JSON map of environment for the final run.
pub const OPTION_RUN_VARIANT_ENV: &str = "run-variant-env";

/// Shared cancellation flag, checked between instructions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one compilation request.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Root variant to compile.
    pub variant: String,
    /// Run the root variant's entrypoint as a final build step.
    pub run_variant: bool,
    pub entrypoint_args: Vec<String>,
    pub run_variant_env: BTreeMap<String, String>,
    pub layout: Layout,
    pub cancel: CancelToken,
    /// Width target names are padded to in log lines. Computed by
    /// [`Compiler::new`].
    pub name_log_width: usize,
}

impl Options {
    pub fn new(variant: &str) -> Self {
        Self {
            variant: variant.to_string(),
            ..Self::default()
        }
    }

    /// Builds options from the string map of extra build options a client
    /// sends along with a request. Unknown keys are ignored.
    pub fn from_build_options(variant: &str, build_options: &BTreeMap<String, String>) -> Result<Self> {
        let mut options = Self::new(variant);

        for (key, value) in build_options {
            match key.as_str() {
                OPTION_RUN_VARIANT => {
                    options.run_variant = value.trim().parse().map_err(|_| Error::ConfigParse {
                        message: format!("invalid value \"{}\" for build option {}", value, key),
                        hint: Some("Use true or false".to_string()),
                    })?;
                }
                OPTION_ENTRYPOINT_ARGS => {
                    options.entrypoint_args = serde_json::from_str(value)?;
                }
                OPTION_RUN_VARIANT_ENV => {
                    options.run_variant_env = serde_json::from_str(value)?;
                }
                other => log::debug!("Ignoring unknown build option {}", other),
            }
        }

        Ok(options)
    }
}

/// A compiled root target and every target it transitively references.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub target: Arc<Target>,
    /// Referenced targets, deduplicated, in first-reference order.
    pub dependencies: Vec<Arc<Target>>,
}

/// Compiles named variants into targets, each at most once.
pub struct Compiler<C> {
    compileables: BTreeMap<String, C>,
    options: Options,
    resolver: Option<Arc<dyn NamedContextResolver>>,
    cache: TargetCache,
}

impl<C: TargetCompileable> Compiler<C> {
    pub fn new<I>(compileables: I, mut options: Options) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let compileables: BTreeMap<String, C> = compileables
            .into_iter()
            .map(|compileable| (compileable.name().to_string(), compileable))
            .collect();

        options.name_log_width = compileables
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or_default();

        Self {
            compileables,
            options,
            resolver: None,
            cache: TargetCache::new(),
        }
    }

    /// Lets the client claim named contexts before they fall back to variant
    /// compilation.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: NamedContextResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn cache(&self) -> &TargetCache {
        &self.cache
    }

    /// Compiles the root variant for the given platform.
    pub fn compile(&self, platform: &Platform) -> Result<CompileResult> {
        let lookup = Lookup {
            compiler: self,
            platform: platform.clone(),
            opt: ContextOpt {
                platform: Some(platform.clone()),
            },
            path: Vec::new(),
        };

        log::debug!("Compiling variant {} for {}", self.options.variant, platform);
        let target = lookup.compile_variant(&self.options.variant)?;

        let mut dependencies = Vec::new();
        let mut seen = HashSet::new();
        collect_dependencies(&target, &mut seen, &mut dependencies);

        Ok(CompileResult {
            target,
            dependencies,
        })
    }

    fn build(&self, compileable: &C, lookup: &Lookup<'_, C>) -> Result<Target> {
        let options = &self.options;
        let mut target = Target::new(
            compileable.name(),
            compileable.base_ref(),
            options.layout.clone(),
            options.name_log_width,
        )
        .for_platform(lookup.platform.clone());
        target.initialize(lookup)?;

        for (phase, instruction) in instructions_in_order(compileable, &options.layout) {
            if options.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    variant: compileable.name().to_string(),
                });
            }

            log::debug!("{}", target.describe(&format!("{}: {}", phase, instruction)));
            instruction.compile(&mut target, lookup)?;
        }

        if options.run_variant && compileable.name() == options.variant {
            target.run_entrypoint(&options.entrypoint_args, &options.run_variant_env);
        }

        log::info!("{}", target.describe(&format!("compiled {} operations", target.ops().len())));
        Ok(target)
    }
}

/// Named-context lookup for one variant's compilation.
struct Lookup<'a, C> {
    compiler: &'a Compiler<C>,
    platform: Platform,
    opt: ContextOpt,
    /// Variants being compiled on this call stack, outermost first.
    path: Vec<String>,
}

impl<C: TargetCompileable> Lookup<'_, C> {
    fn compile_variant(&self, name: &str) -> Result<Arc<Target>> {
        if self.path.iter().any(|entry| entry == name) {
            let mut cycle = self.path.clone();
            cycle.push(name.to_string());
            return Err(Error::CycleDetected {
                cycle: cycle.join(" -> "),
            });
        }

        let compiler = self.compiler;
        let compileable = compiler
            .compileables
            .get(name)
            .ok_or_else(|| Error::UnknownVariant {
                name: name.to_string(),
            })?;

        let key = CacheKey::new(name, &self.platform);
        compiler
            .cache
            .get_or_compile(&key, &compiler.options.cancel, || {
                let mut path = self.path.clone();
                path.push(name.to_string());
                let lookup = Lookup {
                    compiler,
                    platform: self.platform.clone(),
                    opt: self.opt.clone(),
                    path,
                };
                compiler
                    .build(compileable, &lookup)
                    .map_err(|error| error.in_variant(name))
            })
    }
}

impl<C: TargetCompileable> ContextLookup for Lookup<'_, C> {
    fn named_context(&self, name: &str) -> Result<Context> {
        if let Some(resolver) = &self.compiler.resolver {
            if let Some(context) = resolver.resolve(name, &self.opt)? {
                return Ok(context);
            }
        }

        if name == LOCAL_ARTIFACT_KEYWORD {
            return Ok(Context::Local);
        }

        if self.compiler.compileables.contains_key(name) {
            return Ok(Context::Stage(self.compile_variant(name)?));
        }

        if is_image_reference(name) {
            return Ok(Context::Image(name.to_string()));
        }

        Err(Error::NamedContext {
            name: name.to_string(),
            message: "not a client context, known variant, or image reference".to_string(),
        })
    }
}

fn collect_dependencies(target: &Arc<Target>, seen: &mut HashSet<String>, out: &mut Vec<Arc<Target>>) {
    for dependency in target.dependencies() {
        if seen.insert(dependency.name().to_string()) {
            out.push(Arc::clone(dependency));
            collect_dependencies(dependency, seen, out);
        }
    }
}
