//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::MINIMAL);
//!     fixture.command().arg("validate").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Common configuration documents for testing.
#[allow(dead_code)]
pub mod configs {
    /// A single variant on an image base.
    pub const MINIMAL: &str = r#"
version: v4
base: debian:bookworm
variants:
  test:
    entrypoint: [make, test]
"#;

    /// A build variant whose output a production variant copies.
    pub const MULTI_STAGE: &str = r#"
version: v4
base: debian:bookworm
lives:
  in: /srv/service
apt:
  packages: [ca-certificates]
variants:
  build:
    apt:
      packages: [build-essential]
    builder:
      command: [make]
      requirements: [Makefile, src/]
  test:
    includes: [build]
    entrypoint: [make, test]
  production:
    copies: [build]
    entrypoint: [./service]
"#;

    /// Problems in the version, an include, and a path.
    pub const INVALID: &str = r#"
version: v3
variants:
  test:
    includes: [missing]
    lives:
      in: /
"#;

    /// Two variants copying from each other.
    pub const COPIES_CYCLE: &str = r#"
version: v4
base: debian:bookworm
variants:
  a:
    copies: [b]
  b:
    copies: [a]
"#;

    /// Not YAML at all.
    pub const INVALID_YAML: &str = "version: [unclosed";
}

/// A temporary directory with an optional `stagewright.yaml`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `stagewright.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("stagewright.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    #[allow(dead_code)]
    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("stagewright.yaml")
    }

    /// Create a command configured to run in this fixture's directory.
    ///
    /// `STAGEWRIGHT_CONFIG` and `RUST_LOG` are cleared so the caller's
    /// environment cannot change which file is read or what is logged.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stagewright");
        cmd.current_dir(self.path())
            .env_remove("STAGEWRIGHT_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
