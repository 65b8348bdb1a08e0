//! # Stagewright Library
//!
//! This library compiles a layered, variant-based YAML build configuration
//! into per-variant build graphs. It backs the `stagewright` command-line
//! tool and can be embedded by any frontend that drives an image build
//! engine, for example a build-graph gateway that answers named-context
//! requests from the client.
//!
//! ## Quick Example
//!
//! ```
//! use stagewright::build::{Compiler, Options, Platform};
//! use stagewright::{config, dockerfile};
//!
//! let config = config::parse(r#"
//! version: v4
//! base: debian:bookworm
//! variants:
//!   test:
//!     entrypoint: [make, test]
//! "#).unwrap();
//! config::validation::validate(&config).unwrap();
//!
//! let variants = config.variant_compileables("test").unwrap();
//! let result = Compiler::new(variants, Options::new("test"))
//!     .compile(&Platform::default())
//!     .unwrap();
//!
//! let rendered = dockerfile::render(&result).unwrap();
//! assert!(rendered.starts_with("FROM debian:bookworm AS test"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The document schema, parsing, variant
//!   expansion (root, includes and variant merged into one effective
//!   configuration), and batched field-level validation.
//! - **Dependency graph (`depgraph`)**: Orders `includes` and data
//!   dependencies between variants and reports cycles.
//! - **Build model (`build`)**: Phases, instructions, run options and the
//!   orchestrator that compiles each variant into a [`build::Target`] exactly
//!   once per compilation.
//! - **Memoization (`cache`)**: The at-most-once table shared by concurrent
//!   cross-variant references.
//! - **Rendering (`dockerfile`)**: Writes a compiled result as a multi-stage
//!   Dockerfile.
//!
//! ## Execution Flow
//!
//! 1.  **Parse** the document with [`config::parse`].
//! 2.  **Validate** it with [`config::validation::validate`].
//! 3.  **Expand** the requested variant and every variant it depends on with
//!     [`config::Config::variant_compileables`].
//! 4.  **Compile** them with a [`build::Compiler`], once per platform.
//! 5.  **Render** or serialize the resulting targets.

pub mod build;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod depgraph;
pub mod dockerfile;
pub mod error;
pub mod output;

#[cfg(test)]
mod depgraph_proptest;
