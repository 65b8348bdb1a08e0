//! End-to-end tests for the `completions` command.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("stagewright");

    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_stagewright()"))
        .stdout(predicate::str::contains("compile"));
}

#[test]
fn test_completions_zsh() {
    let mut cmd = cargo_bin_cmd!("stagewright");

    cmd.args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef stagewright"));
}

#[test]
fn test_completions_unknown_shell() {
    let mut cmd = cargo_bin_cmd!("stagewright");

    cmd.args(["completions", "tcsh"]).assert().failure();
}
