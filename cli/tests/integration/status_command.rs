//! `outpost status` against a temporary configuration and state directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn outpost() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("outpost"));
    cmd.env_remove("OUTPOST_CONFIG").env("OUTPOST_LOG", "off");
    cmd
}

const STATE: &str = r#"{
  "app/dev": {
    "port": 27018,
    "database": "app_dev",
    "app_username": "app_dev_app",
    "app_password": "Secr3tPassw0rdXYZabcdefghijkmnpq",
    "admin_password": "AdminPassw0rdXYZabcdefghijkmnpq",
    "volume": "outpost-app-dev-data",
    "container_id": "0123456789abcdef0123456789abcdef",
    "created_at": "2026-03-01T09:05:00Z"
  }
}
"#;

/// Writes `outpost.yaml` (and optionally a state file) into a temp dir.
fn workspace(state: Option<&str>) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("outpost.yaml");
    std::fs::write(
        &config,
        "project: app\nenvironment: dev\nhost: db1.invalid\nuser: deploy\nidentity_file: missing-key\n",
    )
    .expect("write config");
    if let Some(state) = state {
        write_state(&dir.path().join(".outpost"), state);
    }
    (dir, config)
}

fn write_state(dir: &Path, body: &str) {
    std::fs::create_dir_all(dir).expect("state dir");
    std::fs::write(dir.join("state.json"), body).expect("write state");
}

#[test]
fn test_status_lists_recorded_instances() {
    let (_dir, config) = workspace(Some(STATE));
    outpost()
        .args(["status", "--no-color", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("app/dev"))
        .stdout(predicate::str::contains("27018"))
        .stdout(predicate::str::contains("app_dev"))
        .stdout(predicate::str::contains("Secr3t").not());
}

#[test]
fn test_status_json_lists_instances() {
    let (_dir, config) = workspace(Some(STATE));
    let output = outpost()
        .args(["status", "--json", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let instances = value["instances"].as_array().expect("array");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["key"], "app/dev");
    assert_eq!(instances[0]["port"], 27018);
    assert!(instances[0]["state"].is_null());
}

#[test]
fn test_status_without_state_file_is_empty() {
    let (_dir, config) = workspace(None);
    outpost()
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No instances recorded"));
}

#[test]
fn test_status_probe_reports_unreachable_host() {
    let (_dir, config) = workspace(Some(STATE));
    let output = outpost()
        .args(["status", "--probe", "--json", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(value["instances"][0]["state"]["unreachable"].is_string());
}

#[test]
fn test_corrupt_state_names_the_field() {
    let (dir, config) = workspace(None);
    write_state(
        &dir.path().join(".outpost"),
        &STATE.replace("\"port\": 27018", "\"port\": 80"),
    );
    outpost()
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("port"));
}

#[test]
fn test_missing_config_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    outpost()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("outpost.yaml"));
}

#[test]
fn test_invalid_config_is_validation_error() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("outpost.yaml");
    std::fs::write(
        &config,
        "project: 'bad project'\nenvironment: dev\nhost: db1\nuser: deploy\nidentity_file: k\n",
    )
    .expect("write");
    let output = outpost()
        .args(["status", "--json", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "validation");
}
