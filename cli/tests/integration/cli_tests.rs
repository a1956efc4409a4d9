//! Argument parsing, help and version.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn outpost() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("outpost"))
}

#[test]
fn test_cli_no_args_shows_help() {
    // arg_required_else_help prints help on stderr and exits 2
    outpost()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Provision MongoDB on a remote host over SSH"));
}

#[test]
fn test_cli_help_lists_commands() {
    let assert = outpost().arg("--help").assert().success();
    for command in ["up", "down", "status", "sync", "backup", "restore", "version"] {
        assert_cmd_contains(&assert, command);
    }
}

fn assert_cmd_contains(assert: &assert_cmd::assert::Assert, needle: &str) {
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains(needle), "help should mention {needle}:\n{stdout}");
}

#[test]
fn test_cli_version_flag() {
    outpost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("outpost"));
}

#[test]
fn test_version_command() {
    outpost()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("outpost {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_version_command_json() {
    let output = outpost().args(["version", "--json"]).output().expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_restore_requires_archive_argument() {
    outpost()
        .arg("restore")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<ARCHIVE>"));
}

#[test]
fn test_unknown_subcommand_fails() {
    outpost().arg("teleport").assert().code(2);
}
