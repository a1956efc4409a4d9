//! Commands that need the host, failing before any connection is made.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::Command;
use outpost_cli::infra::lock::InstanceLock;
use outpost_common::InstanceKey;
use predicates::prelude::*;
use tempfile::TempDir;

fn outpost() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("outpost"));
    cmd.env_remove("OUTPOST_CONFIG").env("OUTPOST_LOG", "off");
    cmd
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("outpost.yaml");
    std::fs::write(
        &config,
        "project: app\nenvironment: dev\nhost: db1.invalid\nuser: deploy\nidentity_file: missing-key\n",
    )
    .expect("write config");
    (dir, config)
}

#[test]
fn test_up_with_missing_key_is_authentication_error() {
    let (_dir, config) = workspace();
    let output = outpost()
        .args(["up", "--json", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(value["code"], "authentication");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_up_human_error_has_hint() {
    let (_dir, config) = workspace();
    outpost()
        .args(["up", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: authentication as deploy@"))
        .stderr(predicate::str::contains("step 2").not())
        .stderr(predicate::str::contains("Hint: verify identity_file"));
}

#[test]
fn test_down_without_confirmation_in_ci_mode() {
    let (_dir, config) = workspace();
    outpost()
        .args(["down", "--yes", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("authentication"));
}

#[test]
fn test_second_run_is_refused_while_locked() {
    let (dir, config) = workspace();
    let key = InstanceKey::new("app", "dev").expect("key");
    let _held = InstanceLock::acquire(&dir.path().join(".outpost"), &key).expect("lock");
    outpost()
        .args(["sync", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("another outpost run holds"))
        .stderr(predicate::str::contains(format!("pid {}", std::process::id())));
}

#[test]
fn test_env_override_selects_other_lock() {
    let (dir, config) = workspace();
    let key = InstanceKey::new("app", "dev").expect("key");
    let _held = InstanceLock::acquire(&dir.path().join(".outpost"), &key).expect("lock");
    outpost()
        .args(["backup", "--env", "staging", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("another outpost run").not());
}
