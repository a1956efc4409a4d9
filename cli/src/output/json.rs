//! JSON output for `--json`.
//!
//! Every command prints exactly one pretty-printed object on stdout.
//! Failures use the `{"error": true, "message", "code"}` shape from
//! [`format_error`].

use anyhow::{Context, Result};
use outpost_common::InstanceKey;
use serde::Serialize;
use serde_json::{Value, json};

use crate::application::services::backup::BackupOutcome;
use crate::application::services::destroy::DestroyOutcome;
use crate::application::services::reconcile::ReconcileOutcome;
use crate::application::services::status::{InstanceStatus, Liveness};
use crate::output::ConnectionInfo;

/// Format the JSON error object.
///
/// ```json
/// { "error": true, "message": "...", "code": "..." }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    to_pretty(&json!({
        "error": true,
        "message": message,
        "code": code,
    }))
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

fn print(value: &Value) -> Result<()> {
    println!("{}", to_pretty(value)?);
    Ok(())
}

/// Renders results as JSON on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn connection(self, info: &ConnectionInfo) -> Result<()> {
        println!("{}", to_pretty(info)?);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn status(self, statuses: &[InstanceStatus]) -> Result<()> {
        let instances: Vec<Value> = statuses
            .iter()
            .map(|s| {
                json!({
                    "key": s.key.to_string(),
                    "port": s.record.port,
                    "database": s.record.database,
                    "container_id": s.record.container_id,
                    "volume": s.record.volume,
                    "created_at": s.record.created_at,
                    "last_backup_at": s.record.last_backup_at,
                    "state": liveness(&s.liveness),
                })
            })
            .collect();
        print(&json!({ "instances": instances }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn destroyed(self, key: &InstanceKey, outcome: &DestroyOutcome) -> Result<()> {
        print(&json!({
            "key": key.to_string(),
            "container_removed": outcome.container_removed,
            "volume_removed": outcome.volume_removed,
            "remote_state_error": outcome.remote_state_error.as_ref().map(ToString::to_string),
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn backup(self, key: &InstanceKey, outcome: &BackupOutcome) -> Result<()> {
        print(&json!({
            "key": key.to_string(),
            "archive": outcome.archive,
            "taken_at": outcome.taken_at,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn restored(self, key: &InstanceKey, archive: &str) -> Result<()> {
        print(&json!({ "key": key.to_string(), "restored_from": archive }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn synced(self, key: &InstanceKey, outcome: &ReconcileOutcome) -> Result<()> {
        print(&json!({
            "key": key.to_string(),
            "changed": outcome.changed,
            "action": outcome.action.to_string(),
            "recorded": outcome.record.is_some(),
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn version(self, version: &str) -> Result<()> {
        print(&json!({ "version": version }))
    }
}

fn liveness(liveness: &Liveness) -> Value {
    match liveness {
        Liveness::NotProbed => Value::Null,
        Liveness::Running => json!("running"),
        Liveness::Stopped => json!("stopped"),
        Liveness::Unreachable(reason) => json!({ "unreachable": reason }),
    }
}
