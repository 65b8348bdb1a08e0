//! # Dockerfile Rendering
//!
//! Renders a [`CompileResult`] as a multi-stage Dockerfile: one stage per
//! referenced variant, dependencies first, followed by the root target.
//!
//! Generated files use BuildKit features (`RUN --mount`, `COPY --chmod` and
//! heredocs), so the output needs a BuildKit-enabled builder.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::build::instruction::quote;
use crate::build::run_option::Mount;
use crate::build::{CompileResult, Context, Op, Target};
use crate::error::Result;

const HEREDOC_DELIMITER: &str = "STAGEWRIGHT_EOF";

/// Renders every target of a compile result as one Dockerfile.
pub fn render(result: &CompileResult) -> Result<String> {
    let rendered = stages(result)
        .into_iter()
        .map(render_target)
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join("\n"))
}

/// The targets of a compile result, each after the targets it references.
pub fn stages(result: &CompileResult) -> Vec<&Target> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    stage_order(&result.target, &mut seen, &mut ordered);
    ordered
}

fn stage_order<'a>(target: &'a Arc<Target>, seen: &mut HashSet<String>, out: &mut Vec<&'a Target>) {
    if !seen.insert(target.name().to_string()) {
        return;
    }
    for dependency in target.dependencies() {
        stage_order(dependency, seen, out);
    }
    out.push(target.as_ref());
}

/// Renders a single target as one build stage.
pub fn render_target(target: &Target) -> Result<String> {
    let mut out = String::new();
    for op in target.ops() {
        writeln!(out, "{}", render_op(op)?).map_err(std::io::Error::other)?;
    }
    Ok(out)
}

fn render_op(op: &Op) -> Result<String> {
    let line = match op {
        Op::From { stage, base } => format!("FROM {} AS {}", base.reference(), stage),
        Op::Arg { name, default } => format!("ARG {}={}", name, quote(default)),
        Op::Env { name, value } => format!("ENV {}={}", name, quote(value)),
        Op::Label { name, value } => format!("LABEL {}={}", quote(name), quote(value)),
        Op::Run { command, mounts, env } => {
            let mut parts = vec!["RUN".to_string()];
            parts.extend(mounts.iter().map(render_mount));
            parts.extend(env.iter().map(|(name, value)| format!("{}={}", name, quote(value))));
            parts.push(command.clone());
            parts.join(" ")
        }
        Op::Script { script, mounts } => {
            let mut parts = vec!["RUN".to_string()];
            parts.extend(mounts.iter().map(render_mount));
            let delimiter = heredoc_delimiter(script);
            parts.push(format!("<<{}", delimiter));
            format!("{}\n{}{}", parts.join(" "), with_newline(script), delimiter)
        }
        Op::Copy {
            from,
            sources,
            destination,
            chown,
        } => {
            let mut parts = vec!["COPY".to_string()];
            if !matches!(from, Context::Local) {
                parts.push(format!("--from={}", from.reference()));
            }
            if let Some(chown) = chown {
                parts.push(format!("--chown={}:{}", chown.uid, chown.gid));
            }
            let mut paths = sources.clone();
            paths.push(destination.clone());
            parts.push(serde_json::to_string(&paths)?);
            parts.join(" ")
        }
        Op::File { path, content, mode } => {
            let delimiter = heredoc_delimiter(content);
            format!(
                "COPY --chmod={:04o} <<{} {}\n{}{}",
                mode,
                delimiter,
                path,
                with_newline(content),
                delimiter
            )
        }
        Op::Workdir { path } => format!("WORKDIR {}", path),
        Op::User { user } => format!("USER {}", user),
        Op::Entrypoint { args } => format!("ENTRYPOINT {}", serde_json::to_string(args)?),
    };
    Ok(line)
}

/// A heredoc delimiter that no line of `content` equals.
fn heredoc_delimiter(content: &str) -> String {
    let mut delimiter = HEREDOC_DELIMITER.to_string();
    let mut suffix = 0;
    while content.lines().any(|line| line == delimiter) {
        suffix += 1;
        delimiter = format!("{}_{}", HEREDOC_DELIMITER, suffix);
    }
    delimiter
}

fn render_mount(mount: &Mount) -> String {
    match mount {
        Mount::Cache {
            target,
            id,
            sharing,
            uid,
            gid,
            source,
        } => {
            let mut options = format!(
                "--mount=type=cache,target={},id={},sharing={}",
                target,
                id,
                sharing.as_str()
            );
            if source.is_some() {
                options.push_str(&format!(",uid={},gid={}", uid, gid));
            }
            options
        }
        Mount::Source {
            target,
            from,
            source,
            readonly,
        } => {
            let mut options = "--mount=type=bind".to_string();
            if !matches!(from, Context::Local) {
                options.push_str(&format!(",from={}", from.reference()));
            }
            if let Some(source) = source {
                options.push_str(&format!(",source={}", source));
            }
            options.push_str(&format!(",target={}", target));
            if *readonly {
                options.push_str(",ro");
            } else {
                options.push_str(",rw");
            }
            options
        }
    }
}

fn with_newline(content: &str) -> String {
    if content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{}\n", content)
    }
}
