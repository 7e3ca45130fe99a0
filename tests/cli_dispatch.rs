//! Integration tests for CLI dispatch
//!
//! These tests verify that main.rs correctly dispatches commands
//! and returns JSON output. Every test points the data directory at a
//! temporary folder and the API at a closed local port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CLOSED_API: &str = "http://127.0.0.1:1/api";

fn raider(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ctf-raider").unwrap();
    cmd.env("CTF_RAIDER_HOME", home.path())
        .env("CTF_API_BASE", CLOSED_API)
        .env_remove("CTF_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Config with two static targets and fast, tiny retry budgets.
fn write_config(home: &TempDir) {
    let config = r#"{
        "min_interval_ms": 0,
        "request_timeout_secs": 2,
        "max_turns": 2,
        "retry": {"max_retries": 1, "initial_delay_ms": 1, "max_delay_ms": 5},
        "targets": [
            {"id": "alpha", "name": "Team Alpha", "endpoint": "alpha"},
            {"id": "bravo", "name": "Team Bravo", "endpoint": "bravo"}
        ]
    }"#;
    fs::write(home.path().join("config.json"), config).unwrap();
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// Help Tests
// ============================================================================

#[test]
fn test_cli_help_displays() {
    let home = TempDir::new().unwrap();
    raider(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-target prompt-injection attack client"));
}

#[test]
fn test_cli_version_displays() {
    let home = TempDir::new().unwrap();
    raider(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ctf-raider"));
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_unknown_command_fails() {
    let home = TempDir::new().unwrap();
    raider(&home).arg("unknown-command").assert().failure();
}

#[test]
fn test_missing_required_args_fails() {
    let home = TempDir::new().unwrap();
    raider(&home).arg("run").assert().failure();
    raider(&home).args(["guess", "alpha"]).assert().failure();
}

#[test]
fn test_invalid_strategy_name_fails() {
    let home = TempDir::new().unwrap();
    raider(&home)
        .args(["strategies", "bribery"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid strategy"));
}

#[test]
fn test_invalid_config_reports_json_error() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("config.json"), "not json").unwrap();

    raider(&home)
        .arg("targets")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("Failed to parse config JSON"));
}

#[test]
fn test_run_unknown_target_reports_json_error() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    raider(&home)
        .args(["run", "charlie"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Unknown target: charlie"));
}

#[test]
fn test_targets_unreachable_api_reports_json_error() {
    let home = TempDir::new().unwrap();

    raider(&home)
        .arg("targets")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"success\": false"));
}

// ============================================================================
// Local Command Tests
// ============================================================================

#[test]
fn test_strategies_lists_catalog() {
    let home = TempDir::new().unwrap();
    let output = raider(&home).arg("strategies").output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 8);
}

#[test]
fn test_targets_uses_configured_list() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    let output = raider(&home).arg("targets").output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 2);
    assert_eq!(json["targets"][0]["id"], "alpha");
    assert_eq!(json["targets"][1]["name"], "Team Bravo");
}

#[test]
fn test_export_without_transcripts_is_empty() {
    let home = TempDir::new().unwrap();
    let output = raider(&home).arg("export").output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 0);
}

#[test]
fn test_logs_and_clear_logs() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    raider(&home).arg("targets").assert().success();

    let output = raider(&home).args(["logs", "10", "targets"]).output().unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["count"], 1);
    assert_eq!(json["entries"][0]["operation"], "targets");
    assert_eq!(json["entries"][0]["message"], "count=2");

    raider(&home)
        .arg("clear-logs")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cleared\": true"));

    let output = raider(&home).arg("logs").output().unwrap();
    assert_eq!(stdout_json(&output)["count"], 0);
}

// ============================================================================
// Attack Tests
// ============================================================================

#[test]
fn test_sweep_against_unreachable_api_exhausts_and_saves() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    let output = raider(&home).args(["sweep", "--sequential"]).output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["report"]["total"], 2);
    assert_eq!(json["report"]["captured"], 0);
    assert_eq!(json["report"]["entries"][0]["status"], "exhausted");
    assert_eq!(json["report"]["entries"][1]["status"], "exhausted");

    let output = raider(&home).arg("export").output().unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["count"], 2);
    assert_eq!(json["transcripts"][0]["targetId"], "alpha");
    assert_eq!(json["transcripts"][0]["failedAttempts"], 1);
    assert_eq!(json["transcripts"][0]["turns"].as_array().unwrap().len(), 0);
}

#[test]
fn test_sweep_refuses_corrupt_transcript_file() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    let path = home.path().join("transcripts.json");
    fs::write(&path, "[{\"targetId\": \"alpha\", trunc").unwrap();

    raider(&home)
        .args(["sweep", "--sequential"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Failed to parse transcripts"));

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "[{\"targetId\": \"alpha\", trunc"
    );
}

#[test]
fn test_sweep_does_not_reattack_saved_capture() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    let saved = r#"[{
        "sessionId": "6f1c2a4e-0b7d-4c39-9a1e-2f5d8c3b7a10",
        "targetId": "alpha",
        "targetName": "Team Alpha",
        "status": "succeeded",
        "extraction": {"flag": "FLAG{kept}", "turnNumber": 1},
        "failedAttempts": 0,
        "turns": [],
        "startedAt": "2026-01-01T00:00:00Z",
        "endedAt": "2026-01-01T00:00:05Z"
    }]"#;
    fs::write(home.path().join("transcripts.json"), saved).unwrap();

    let output = raider(&home).args(["sweep", "--sequential"]).output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["report"]["captured"], 1);
    assert_eq!(json["report"]["entries"][0]["status"], "succeeded");
    assert_eq!(json["report"]["entries"][1]["status"], "exhausted");

    let output = raider(&home).arg("export").output().unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["count"], 2);
    assert_eq!(json["transcripts"][0]["extraction"]["flag"], "FLAG{kept}");
    assert_eq!(json["transcripts"][1]["targetId"], "bravo");
}
