//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `validate` subcommand from a user's perspective.

mod common;
use common::prelude::*;

#[test]
fn test_validate_valid_config() {
    let fixture = TestFixture::new().with_config(configs::MULTI_STAGE);

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Variants: 3"))
        .stdout(predicate::str::contains("[OK] Configuration is valid"));
}

#[test]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[ERR] Configuration parsing failed"));
}

#[test]
fn test_validate_reports_every_problem() {
    let fixture = TestFixture::new().with_config(configs::INVALID);

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "version: config version \"v3\" is unsupported",
        ))
        .stdout(predicate::str::contains(
            "variants.test.includes[0]: references an unknown variant \"missing\"",
        ))
        .stdout(predicate::str::contains(
            "variants.test.lives.in: \"/\" is not a valid absolute non-root path",
        ))
        .stderr(predicate::str::contains("Configuration validation failed"));
}

#[test]
fn test_validate_reports_copies_cycle() {
    let fixture = TestFixture::new().with_config(configs::COPIES_CYCLE);

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Cycle detected in variant dependencies: a -> b -> a"));
}

#[test]
fn test_validate_explicit_config_path() {
    let fixture = TestFixture::new().with_file("configs/build.yaml", configs::MINIMAL);

    fixture
        .command()
        .args(["validate", "--config", "configs/build.yaml"])
        .assert()
        .success();
}

#[test]
fn test_validate_missing_config() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration parsing failed"));
}
