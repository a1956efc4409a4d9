//! Command implementations.
//!
//! Each module wires infrastructure into one application service and
//! renders the result. Errors are `anyhow` here; [`describe`] turns them
//! back into the stable code and remedy shown to the operator.

pub mod backup;
pub mod down;
pub mod restore;
pub mod status;
pub mod sync;
pub mod up;
pub mod version;

use crate::domain::{BackupError, ConfigError, DestroyError, ErrorKind, ProvisionError, RemoteError, StateError};

/// Operator-facing rendering of a failed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    /// Stable code for `--json` output.
    pub code: &'static str,
    pub hint: Option<String>,
}

/// Find the first typed error in `error`'s chain and describe it.
#[must_use]
pub fn describe(error: &anyhow::Error) -> Failure {
    let message = format!("{error:#}");
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<ProvisionError>() {
            // The step error repeats its source in Display, so the chain is not joined.
            let host = e.host().unwrap_or("controller");
            return Failure {
                message: format!("{} failed on {host}: {e}", e.step()),
                code: e.kind().code(),
                hint: Some(e.remediation()),
            };
        }
        if let Some(e) = cause.downcast_ref::<BackupError>() {
            return Failure {
                message,
                code: e.kind().code(),
                hint: Some(e.remediation()),
            };
        }
        if let Some(e) = cause.downcast_ref::<DestroyError>() {
            let hint = match e {
                DestroyError::Remote(remote) => Some(remote.remediation()),
                DestroyError::NotFound { .. } => Some("check the project and --env values".to_string()),
                _ => None,
            };
            return Failure {
                message,
                code: e.kind().code(),
                hint,
            };
        }
        if let Some(e) = cause.downcast_ref::<RemoteError>() {
            return Failure {
                message,
                code: e.kind().code(),
                hint: Some(e.remediation()),
            };
        }
        if let Some(e) = cause.downcast_ref::<StateError>() {
            return Failure {
                message,
                code: e.kind().code(),
                hint: None,
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return Failure {
                message,
                code: ErrorKind::Validation.code(),
                hint: Some("fix the value in outpost.yaml and re-run".to_string()),
            };
        }
    }
    Failure {
        message,
        code: "error",
        hint: None,
    }
}
