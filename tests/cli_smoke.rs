use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/query_output.jsonl")
}

#[test]
fn cli_sync_reports_counts() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.arg("sync").arg("--path").arg(dir.path()).arg("--input").arg(fixture()).arg("--format").arg("json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"complete\""))
        .stdout(predicate::str::contains("\"source_files\": 5"))
        .stdout(predicate::str::contains("\"project_deps\": 5"));
}

#[test]
fn cli_deps_lists_external_targets() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.arg("query")
        .arg("deps")
        .arg("--path")
        .arg(dir.path())
        .arg("--input")
        .arg(fixture())
        .arg("--file")
        .arg("java/com/app/MainActivity.java")
        .arg("--format")
        .arg("json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("@maven//:androidx_appcompat"))
        .stdout(predicate::str::contains("//third_party/jsr:jsr305"))
        .stdout(predicate::str::contains("@maven//:junit").not());
}

#[test]
fn cli_owner_text_output() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["query", "owner", "--file", "javatests/com/core/CoreTest.java", "--input"])
        .arg(fixture())
        .arg("--path")
        .arg(dir.path());
    cmd.assert().success().stdout(predicate::str::contains("//javatests/com/core:CoreTest"));

    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["query", "owner", "--file", "nowhere/X.java", "--input"]).arg(fixture()).arg("--path").arg(dir.path());
    cmd.assert().success().stdout(predicate::str::contains("<no owning target>"));
}

#[test]
fn cli_config_default_format_wins() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("querysync.toml"), "[query]\ndefault_format = \"json\"\n").unwrap();
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["query", "sources", "--kind", "android", "--input"]).arg(fixture()).arg("--path").arg(dir.path());
    cmd.assert().success().stdout(predicate::str::starts_with("[").and(predicate::str::contains("MainActivity.java")));
}

#[test]
fn cli_failure_exit_codes() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["query", "closure", "--target", "no-slashes", "--input"]).arg(fixture()).arg("--path").arg(dir.path());
    cmd.assert().code(2).stderr(predicate::str::contains("Invalid label"));

    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["sync", "--input"]).arg(dir.path().join("missing.jsonl")).arg("--path").arg(dir.path());
    cmd.assert().code(1).stderr(predicate::str::contains("Failed to read query output"));
}

#[test]
fn cli_rejects_unknown_format() {
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["sync", "--format", "yaml"]);
    cmd.assert().failure().stderr(predicate::str::contains("invalid value"));
}

#[test]
fn cli_generates_completions() {
    let mut cmd = Command::cargo_bin("querysync").unwrap();
    cmd.args(["completions", "bash"]);
    cmd.assert().success().stdout(predicate::str::contains("querysync"));
}
