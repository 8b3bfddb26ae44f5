//! Smoke tests for the clinflow CLI
//!
//! Scenario runs use `--simulate`, so no browser is needed.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the clinflow binary with a clean environment
fn clinflow() -> Command {
    let mut cmd = Command::cargo_bin("clinflow").expect("clinflow binary should exist");
    for key in [
        "CLINFLOW_CONFIG",
        "CLINFLOW_BASE_URL",
        "CLINFLOW_USERNAME",
        "CLINFLOW_PASSWORD",
        "CLINFLOW_HEADLESS",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    clinflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    clinflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_shows_help() {
    clinflow().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    clinflow()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--simulate"))
        .stdout(predicate::str::contains("--fail-fast"));
}

// ============================================================================
// list / config
// ============================================================================

#[test]
fn test_list_shows_catalog() {
    clinflow()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("full-journey"));
}

#[test]
fn test_list_json() {
    let output = clinflow().args(["list", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<_> = parsed
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"register-and-search".to_string()));
}

#[test]
fn test_config_redacts_password() {
    clinflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url"))
        .stdout(predicate::str::contains("Admin123").not());
}

#[test]
fn test_config_check_rejects_bad_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("clinflow.yaml");
    fs::write(&file, "base_url: ftp://clinic\n").unwrap();
    clinflow()
        .args(["config", "--check", "--config"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_url"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_requires_selection() {
    clinflow()
        .args(["run", "--simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));
}

#[test]
fn test_run_unknown_scenario() {
    clinflow()
        .args(["run", "no-such-journey", "--simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scenario"));
}

#[test]
fn test_run_bootstrap_simulated() {
    let tmp = TempDir::new().unwrap();
    let reports = tmp.path().join("reports");
    clinflow()
        .args(["--color", "never", "run", "bootstrap", "--simulate", "--report-dir"])
        .arg(&reports)
        .arg("--artifacts")
        .arg(tmp.path().join("artifacts"))
        .assert()
        .success()
        .stdout(predicate::str::contains("clinflow-report.json"));

    let json = fs::read_to_string(reports.join("clinflow-report.json")).unwrap();
    assert!(json.contains("\"passed\""));
    assert!(reports.join("clinflow-junit.xml").exists());
}

#[test]
fn test_run_failure_exits_nonzero_with_artifacts() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("clinflow.yaml");
    fs::write(
        &file,
        "timeouts:\n  step_ms: 300\n  long_step_ms: 300\n  navigation_ms: 300\n  scenario_ms: 5000\n  poll_interval_ms: 20\n",
    )
    .unwrap();
    let reports = tmp.path().join("reports");
    let artifacts = tmp.path().join("artifacts");

    clinflow()
        .env("CLINFLOW_PASSWORD", "wrong")
        .args(["--color", "never", "--config"])
        .arg(&file)
        .args(["run", "bootstrap", "--simulate", "--report-dir"])
        .arg(&reports)
        .arg("--artifacts")
        .arg(&artifacts)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 scenario(s) failed"));

    let json = fs::read_to_string(reports.join("clinflow-report.json")).unwrap();
    assert!(json.contains("\"failed\""));
    assert!(json.contains("bootstrap"));
    assert!(artifacts.join("bootstrap").join("context.json").exists());
}
