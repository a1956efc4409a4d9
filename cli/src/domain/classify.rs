//! Translation of external tools' unstructured stderr into typed outcomes.
//!
//! Every function here matches substrings of messages printed by ssh,
//! docker or the MongoDB tools. The wording is not a stable interface, so
//! each command type has exactly one classifier and nothing else in the
//! crate inspects stderr text.

use crate::domain::error::RemoteError;
use crate::domain::remote::CommandResult;

const SSH_AUTH_SIGNATURES: &[&str] = &[
    "permission denied",
    "publickey",
    "too many authentication failures",
    "host key verification failed",
    "no mutual signature",
];

const SSH_TRANSPORT_SIGNATURES: &[&str] = &[
    "control socket",
    "mux_client",
    "connection closed by",
    "closed by remote host",
    "connection reset",
    "connection refused",
    "connection timed out",
    "network is unreachable",
    "could not resolve hostname",
    "broken pipe",
    "master is not running",
];

/// Classify the stderr of a failed `ssh` connection attempt.
///
/// Credential rejections become [`RemoteError::Auth`]; everything else,
/// including unrecognised text, is presumed transient.
#[must_use]
pub fn classify_ssh_failure(host: &str, user: &str, stderr: &str) -> RemoteError {
    let lower = stderr.to_lowercase();
    let reason = first_line(stderr);
    if SSH_AUTH_SIGNATURES.iter().any(|s| lower.contains(s)) {
        RemoteError::Auth {
            host: host.to_string(),
            user: user.to_string(),
            reason,
        }
    } else {
        RemoteError::Connection {
            host: host.to_string(),
            reason,
        }
    }
}

/// Whether an `ssh` exit of 255 came from the transport rather than from
/// the remote command.
#[must_use]
pub fn is_transport_failure(exit_code: i32, stderr: &str) -> bool {
    if exit_code != 255 {
        return false;
    }
    let lower = stderr.to_lowercase();
    SSH_TRANSPORT_SIGNATURES.iter().any(|s| lower.contains(s))
}

/// Outcome of a `docker ps` style probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerProbe {
    Ready,
    /// The user may not talk to the daemon socket.
    PermissionDenied,
    /// The daemon is not running or not answering.
    DaemonUnavailable(String),
    Failed(String),
}

#[must_use]
pub fn classify_docker_probe(result: &CommandResult) -> DockerProbe {
    if result.success() {
        return DockerProbe::Ready;
    }
    let lower = result.stderr().to_lowercase();
    let detail = first_line(result.diagnostic());
    if lower.contains("permission denied") && lower.contains("docker.sock") {
        DockerProbe::PermissionDenied
    } else if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("no such file or directory")
    {
        DockerProbe::DaemonUnavailable(detail)
    } else {
        DockerProbe::Failed(detail)
    }
}

/// Whether a docker error says the container does not exist.
#[must_use]
pub fn is_no_such_container(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

/// Whether a docker error says the volume does not exist.
#[must_use]
pub fn is_no_such_volume(stderr: &str) -> bool {
    stderr.to_lowercase().contains("no such volume")
}

/// Outcome of a `createUser` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCreation {
    Created,
    AlreadyExists,
    Failed(String),
}

#[must_use]
pub fn classify_create_user(result: &CommandResult) -> UserCreation {
    if result.success() {
        return UserCreation::Created;
    }
    let combined = format!("{}\n{}", result.stdout(), result.stderr()).to_lowercase();
    if combined.contains("already exists") {
        UserCreation::AlreadyExists
    } else {
        UserCreation::Failed(first_line(result.diagnostic()))
    }
}

/// Outcome category of a failed `mongodump`/`mongorestore` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupFailure {
    ContainerMissing,
    DiskFull,
    PermissionDenied(String),
    CorruptArchive(String),
    Other(String),
}

#[must_use]
pub fn classify_backup_failure(stderr: &str) -> BackupFailure {
    let lower = stderr.to_lowercase();
    let detail = first_line(stderr);
    if is_no_such_container(stderr) || lower.contains("is not running") {
        BackupFailure::ContainerMissing
    } else if lower.contains("no space left on device") || lower.contains("disk quota exceeded") {
        BackupFailure::DiskFull
    } else if lower.contains("permission denied") {
        BackupFailure::PermissionDenied(detail)
    } else if lower.contains("gzip")
        || lower.contains("unexpected eof")
        || lower.contains("corrupt")
        || lower.contains("invalid archive")
        || lower.contains("not in gzip format")
    {
        BackupFailure::CorruptArchive(detail)
    } else {
        BackupFailure::Other(detail)
    }
}

fn first_line(text: &str) -> String {
    text.trim().lines().next().unwrap_or_default().trim().to_string()
}
