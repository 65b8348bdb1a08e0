//! Engine-agnostic build instructions.
//!
//! Instructions are pure data. They can be rendered as primitive tokens
//! ([`Instruction::tokens`]) and compiled into a [`Target`]'s build-graph
//! state ([`Instruction::compile`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::run_option::RunOption;
use super::target::{Chown, Context, ContextLookup, Op, Target};
use crate::error::{Error, Result};

/// Quotes a shell argument, escaping backslashes, double quotes, newlines
/// and tabs.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn quote_all(values: &[String]) -> Vec<String> {
    values.iter().map(|value| quote(value)).collect()
}

/// A shell command with `%s` placeholders and positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub command: String,
    pub arguments: Vec<String>,
}

impl Run {
    pub fn new<I, S>(command: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.to_string(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    /// Substitutes placeholders with quoted arguments and appends the rest.
    pub fn render(&self) -> String {
        let mut arguments = self.arguments.iter();
        let mut pieces = self.command.split("%s");
        let mut rendered = pieces.next().unwrap_or_default().to_string();

        for piece in pieces {
            match arguments.next() {
                Some(argument) => rendered.push_str(&quote(argument)),
                None => rendered.push_str("%s"),
            }
            rendered.push_str(piece);
        }

        for argument in arguments {
            rendered.push(' ');
            rendered.push_str(&quote(argument));
        }

        rendered
    }
}

fn join_runs(runs: &[Run]) -> String {
    runs.iter().map(Run::render).collect::<Vec<_>>().join(" && ")
}

/// Files to copy and where to put them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Copy {
    pub sources: Vec<String>,
    pub destination: String,
}

impl Copy {
    pub fn new<I, S>(sources: I, destination: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            destination: destination.to_string(),
        }
    }

    /// The destination, with a trailing `/` when copying several sources.
    fn destination_path(&self) -> String {
        if self.sources.len() > 1 && !self.destination.ends_with('/') {
            format!("{}/", self.destination)
        } else {
            self.destination.clone()
        }
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens = quote_all(&self.sources);
        tokens.push(quote(&self.destination_path()));
        tokens
    }

    fn compile(&self, target: &mut Target, from: Context, chown: Option<Chown>) {
        let sources: Vec<String> = self.sources.iter().map(|s| target.expand_env(s)).collect();
        let destination = target.expand_env(&self.destination_path());
        target.push(Op::Copy {
            from,
            sources,
            destination,
            chown,
        });
    }
}

/// A single engine-agnostic build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Instruction {
    /// Start a stage from an image or another variant.
    Base { image: String, stage: String },
    /// Start a stage from an empty filesystem.
    ScratchBase { stage: String },
    Run(Run),
    /// Several commands chained with `&&`.
    RunAll(Vec<Run>),
    RunAllWithOptions {
        runs: Vec<Run>,
        options: Vec<RunOption>,
    },
    /// An inline script, executed as one step.
    RunScript {
        script: String,
        options: Vec<RunOption>,
    },
    /// Copy from the local build context.
    Copy(Copy),
    /// Copy from a named context.
    CopyFrom { from: String, copy: Copy },
    /// Copy with ownership. `from` is `None` for the local build context.
    CopyAs {
        uid: String,
        gid: String,
        from: Option<String>,
        copy: Copy,
    },
    File {
        path: String,
        content: String,
        mode: u32,
    },
    Env(BTreeMap<String, String>),
    Label(BTreeMap<String, String>),
    StringArg { name: String, default: String },
    UintArg { name: String, default: u32 },
    WorkingDirectory(String),
    EntryPoint(Vec<String>),
    User { uid: String },
}

impl Instruction {
    pub fn run<I, S>(command: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Instruction::Run(Run::new(command, arguments))
    }

    pub fn env<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Instruction::Env(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn string_arg(name: &str, default: &str) -> Self {
        Instruction::StringArg {
            name: name.to_string(),
            default: default.to_string(),
        }
    }

    /// Short name of the instruction kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Base { .. } => "Base",
            Instruction::ScratchBase { .. } => "ScratchBase",
            Instruction::Run(_) => "Run",
            Instruction::RunAll(_) => "RunAll",
            Instruction::RunAllWithOptions { .. } => "RunAllWithOptions",
            Instruction::RunScript { .. } => "RunScript",
            Instruction::Copy(_) => "Copy",
            Instruction::CopyFrom { .. } => "CopyFrom",
            Instruction::CopyAs { .. } => "CopyAs",
            Instruction::File { .. } => "File",
            Instruction::Env(_) => "Env",
            Instruction::Label(_) => "Label",
            Instruction::StringArg { .. } => "StringArg",
            Instruction::UintArg { .. } => "UintArg",
            Instruction::WorkingDirectory(_) => "WorkingDirectory",
            Instruction::EntryPoint(_) => "EntryPoint",
            Instruction::User { .. } => "User",
        }
    }

    /// Primitive token form of the instruction.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Instruction::Base { image, stage } => vec![image.clone(), stage.clone()],
            Instruction::ScratchBase { stage } => vec![stage.clone()],
            Instruction::Run(run) => vec![run.render()],
            Instruction::RunAll(runs) | Instruction::RunAllWithOptions { runs, .. } => {
                vec![join_runs(runs)]
            }
            Instruction::RunScript { script, .. } => vec![script.clone()],
            Instruction::Copy(copy) => copy.tokens(),
            Instruction::CopyFrom { from, copy } => {
                let mut tokens = vec![from.clone()];
                tokens.extend(copy.tokens());
                tokens
            }
            Instruction::CopyAs {
                uid,
                gid,
                from,
                copy,
            } => {
                let mut tokens = vec![format!("{}:{}", uid, gid)];
                tokens.extend(from.iter().cloned());
                tokens.extend(copy.tokens());
                tokens
            }
            Instruction::File { path, mode, .. } => vec![path.clone(), format!("{:04o}", mode)],
            Instruction::Env(vars) | Instruction::Label(vars) => vars
                .iter()
                .map(|(key, value)| format!("{}={}", key, quote(value)))
                .collect(),
            Instruction::StringArg { name, default } => {
                vec![format!("{}={}", name, quote(default))]
            }
            Instruction::UintArg { name, default } => vec![format!("{}={}", name, default)],
            Instruction::WorkingDirectory(path) => vec![quote(path)],
            Instruction::EntryPoint(args) => quote_all(args),
            Instruction::User { uid } if uid.is_empty() => vec!["0".to_string()],
            Instruction::User { uid } => vec![uid.clone()],
        }
    }

    /// Applies the instruction to the target's build-graph state, resolving
    /// any named contexts it references.
    pub fn compile(&self, target: &mut Target, contexts: &dyn ContextLookup) -> Result<()> {
        match self {
            Instruction::Base { stage, .. } => {
                let base = target.base().clone();
                target.push(Op::From {
                    stage: stage.clone(),
                    base,
                });
            }
            Instruction::ScratchBase { stage } => target.push(Op::From {
                stage: stage.clone(),
                base: Context::Scratch,
            }),
            Instruction::Run(run) => target.push(Op::Run {
                command: run.render(),
                mounts: Vec::new(),
                env: BTreeMap::new(),
            }),
            Instruction::RunAll(runs) => target.push(Op::Run {
                command: join_runs(runs),
                mounts: Vec::new(),
                env: BTreeMap::new(),
            }),
            Instruction::RunAllWithOptions { runs, options } => {
                let mounts = options
                    .iter()
                    .map(|option| option.mount(target, contexts))
                    .collect::<Result<Vec<_>>>()?;
                target.push(Op::Run {
                    command: join_runs(runs),
                    mounts,
                    env: BTreeMap::new(),
                });
            }
            Instruction::RunScript { script, options } => {
                let mounts = options
                    .iter()
                    .map(|option| option.mount(target, contexts))
                    .collect::<Result<Vec<_>>>()?;
                target.push(Op::Script {
                    script: script.clone(),
                    mounts,
                });
            }
            Instruction::Copy(copy) => copy.compile(target, Context::Local, None),
            Instruction::CopyFrom { from, copy } => {
                let from = target.resolve(from, contexts)?;
                copy.compile(target, from, None);
            }
            Instruction::CopyAs {
                uid,
                gid,
                from,
                copy,
            } => {
                let chown = Chown {
                    uid: self.parse_owner(target, uid)?,
                    gid: self.parse_owner(target, gid)?,
                };
                let from = match from {
                    Some(name) => target.resolve(name, contexts)?,
                    None => Context::Local,
                };
                copy.compile(target, from, Some(chown));
            }
            Instruction::File {
                path,
                content,
                mode,
            } => {
                let path = target.expand_env(path);
                target.push(Op::File {
                    path,
                    content: content.clone(),
                    mode: *mode,
                });
            }
            Instruction::Env(vars) => {
                for (name, value) in vars {
                    target.add_env(name, value);
                }
            }
            Instruction::Label(labels) => {
                for (name, value) in labels {
                    target.add_label(name, value);
                }
            }
            Instruction::StringArg { name, default } => target.add_arg(name, default),
            Instruction::UintArg { name, default } => target.add_arg(name, &default.to_string()),
            Instruction::WorkingDirectory(path) => target.set_working_dir(path),
            Instruction::EntryPoint(args) => target.set_entrypoint(args),
            Instruction::User { uid } if uid.is_empty() => target.set_user("0"),
            Instruction::User { uid } => target.set_user(uid),
        }
        Ok(())
    }

    fn parse_owner(&self, target: &Target, value: &str) -> Result<u32> {
        let expanded = target.expand_env(value);
        expanded.trim().parse().map_err(|_| Error::Instruction {
            instruction: self.to_string(),
            message: format!("owner \"{}\" does not expand to a numeric id", expanded),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.tokens().join(" "))
    }
}
