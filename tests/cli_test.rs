//! Command-line Integration Tests

#![allow(deprecated)] // Allow deprecated cargo_bin for now

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn create_test_workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("src")).expect("Failed to create src");
    std::fs::write(
        dir.path().join("src/Main.hs"),
        "module Main where\n\nimport Lib\n\nmain :: IO ()\nmain = print (double 21)\n",
    )
    .expect("Failed to write Main.hs");
    std::fs::write(
        dir.path().join("src/Lib.hs"),
        "module Lib where\n\ndouble :: Int -> Int\ndouble x = x * 2\n",
    )
    .expect("Failed to write Lib.hs");
    dir
}

fn hs_locator(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hs-locator").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--workspace")
        .arg(workspace)
        .arg("--engine")
        .arg("embedded");
    cmd
}

#[test]
fn test_binary_help() {
    Command::cargo_bin("hs-locator")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Haskell identifiers"));
}

#[test]
fn test_binary_version() {
    Command::cargo_bin("hs-locator")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hs-locator"));
}

#[test]
fn test_locate_identifier() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "double"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lib.hs:3: double :: Int -> Int"));
}

#[test]
fn test_locate_at_position() {
    let workspace = create_test_workspace();
    // `double` in `main = print (double 21)`
    hs_locator(workspace.path())
        .args(["locate", "--file", "src/Main.hs", "--line", "6", "--column", "16"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lib.hs:3: double :: Int -> Int"));
}

#[test]
fn test_locate_in_own_file() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "main", "--file", "src/Main.hs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Main.hs:5: main :: IO ()"));
}

#[test]
fn test_locate_json() {
    let workspace = create_test_workspace();
    let output = hs_locator(workspace.path())
        .args(["locate", "double", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let lookup: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(lookup["identifier"], "double");
    assert_eq!(lookup["locations"][0]["line_index"], 2);
    assert_eq!(lookup["locations"][0]["kind"], "signature_same_line");
}

#[test]
fn test_locate_not_found() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "triple"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No definition found for `triple`"));
}

#[test]
fn test_locate_rejects_zero_line() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "--file", "src/Main.hs", "--line", "0", "--column", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn test_locate_rejects_line_without_column() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "--file", "src/Main.hs", "--line", "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be given together"));

    hs_locator(workspace.path())
        .args(["locate", "double", "--column", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be given together"));
}

#[test]
fn test_locate_missing_file() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["locate", "double", "--file", "src/Nope.hs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FileNotFound"));
}

#[test]
fn test_dump_to_file() {
    let workspace = create_test_workspace();
    let report = workspace.path().join("report.md");

    hs_locator(workspace.path())
        .args(["dump", "src/Main.hs", "--output"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let markdown = std::fs::read_to_string(report).unwrap();
    assert!(markdown.starts_with("# Definition Dump for "));
    assert!(markdown.contains("\"double\": "));
    assert!(markdown.contains("## Identifiers Without Definitions"));
}

#[test]
fn test_dump_to_stdout() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .args(["dump", "src/Lib.hs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"double\": "));
}

#[test]
fn test_missing_config_file() {
    let workspace = create_test_workspace();
    hs_locator(workspace.path())
        .arg("--config")
        .arg(workspace.path().join("missing.yaml"))
        .args(["locate", "double"])
        .assert()
        .failure();
}
