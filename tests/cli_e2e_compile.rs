//! End-to-end tests for the `compile` command.
//!
//! These tests invoke the actual CLI binary and check the rendered build
//! graph from a user's perspective.

mod common;
use common::prelude::*;

#[test]
fn test_compile_minimal_dockerfile() {
    let fixture = TestFixture::new().with_config(configs::MINIMAL);

    fixture
        .command()
        .args(["compile", "test"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("FROM debian:bookworm AS test\n"))
        .stdout(predicate::str::contains("ENTRYPOINT [\"make\",\"test\"]"));
}

#[test]
fn test_compile_renders_dependencies_first() {
    let fixture = TestFixture::new().with_config(configs::MULTI_STAGE);

    let output = fixture
        .command()
        .args(["compile", "production"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let build = stdout.find("FROM debian:bookworm AS build").expect("build stage");
    let production = stdout
        .find("FROM debian:bookworm AS production")
        .expect("production stage");
    assert!(build < production);
    assert!(stdout.contains("COPY --from=build --chown=65533:65533 [\"/srv/service\",\"/srv/service\"]"));
    assert!(stdout.contains("COPY --from=build --chown=65533:65533 [\"/opt/lib\",\"/opt/lib\"]"));
}

#[test]
fn test_compile_json_per_platform() {
    let fixture = TestFixture::new().with_config(configs::MULTI_STAGE);

    let output = fixture
        .command()
        .args([
            "compile",
            "production",
            "--format",
            "json",
            "--platform",
            "linux/amd64",
            "--platform",
            "linux/arm64/v8",
        ])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let platforms = json.as_array().expect("one entry per platform");
    assert_eq!(platforms.len(), 2);
    assert_eq!(platforms[0]["platform"], "linux/amd64");
    assert_eq!(platforms[1]["platform"], "linux/arm64/v8");

    let names: Vec<&str> = platforms[0]["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|target| target["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["build", "production"]);
}

#[test]
fn test_compile_run_variant() {
    let fixture = TestFixture::new().with_config(configs::MINIMAL);

    fixture
        .command()
        .args([
            "compile",
            "test",
            "--run-variant",
            "--entrypoint-args",
            r#"["-v"]"#,
            "--run-variant-env",
            r#"{"CI":"1"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"RUN CI="1" "make" "test" "-v""#));
}

#[test]
fn test_compile_config_from_env() {
    let fixture = TestFixture::new().with_file("other.yaml", configs::MINIMAL);

    fixture
        .command()
        .env("STAGEWRIGHT_CONFIG", "other.yaml")
        .args(["compile", "test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AS test"));
}

#[test]
fn test_compile_unknown_variant() {
    let fixture = TestFixture::new().with_config(configs::MINIMAL);

    fixture
        .command()
        .args(["compile", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown variant: nope"));
}

#[test]
fn test_compile_invalid_platform() {
    let fixture = TestFixture::new().with_config(configs::MINIMAL);

    fixture
        .command()
        .args(["compile", "test", "--platform", "linux"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid platform"));
}

#[test]
fn test_compile_invalid_build_option() {
    let fixture = TestFixture::new().with_config(configs::MINIMAL);

    fixture
        .command()
        .args(["compile", "test", "--entrypoint-args", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid build options"));
}

#[test]
fn test_compile_rejects_invalid_config() {
    let fixture = TestFixture::new().with_config(configs::INVALID);

    fixture
        .command()
        .args(["compile", "test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_compile_missing_config() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["compile", "test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config from stagewright.yaml"));
}
