//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! Every error exposes an [`ErrorKind`] so callers switch on the kind rather
//! than on the concrete type. All of them convert to `anyhow::Error` via `?`.

use std::fmt;
use std::time::Duration;

use outpost_common::KeyError;
use thiserror::Error;

// ── Error kinds ───────────────────────────────────────────────────────────────

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or host reachability. Retryable.
    Connection,
    /// Credential rejection. Never retried.
    Authentication,
    /// Non-zero exit from a specific remote command.
    Command,
    /// A bounded wait ran out.
    Timeout,
    /// State or configuration schema violation.
    Validation,
    /// A provisioning step failed for a domain reason.
    Provisioning,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Stable machine-readable code used by `--json` output.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Authentication => "authentication",
            Self::Command => "command",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Provisioning => "provisioning",
            Self::Io => "io",
        }
    }
}

// ── Remote transport errors ───────────────────────────────────────────────────

/// Failures of the remote transport itself (never of the remote command).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("cannot reach {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("authentication as {user}@{host} was rejected: {reason}")]
    Auth {
        host: String,
        user: String,
        reason: String,
    },

    #[error("'{command}' on {host} did not finish within {}s", timeout.as_secs())]
    Timeout {
        host: String,
        command: String,
        timeout: Duration,
    },

    #[error("ssh client is not usable: {reason}")]
    ClientUnavailable { reason: String },
}

impl RemoteError {
    /// Only connection-level failures are transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } | Self::ClientUnavailable { .. } => ErrorKind::Connection,
            Self::Auth { .. } => ErrorKind::Authentication,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Connection { host, .. } | Self::Auth { host, .. } | Self::Timeout { host, .. } => {
                Some(host)
            }
            Self::ClientUnavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::Connection { host, .. } => format!(
                "check that {host} is up and reachable on its SSH port, then re-run"
            ),
            Self::Auth { host, user, .. } => format!(
                "verify identity_file in outpost.yaml and that its public key is in ~{user}/.ssh/authorized_keys on {host}"
            ),
            Self::Timeout { .. } => {
                "the remote command may still be running; inspect the host before retrying".to_string()
            }
            Self::ClientUnavailable { .. } => "install the OpenSSH client (ssh) and ensure it is on PATH".to_string(),
        }
    }
}

// ── State errors ──────────────────────────────────────────────────────────────

/// Failures reading or writing a state collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{location}: {} field '{field}' {reason}", record_label(key.as_deref()))]
    Validation {
        location: String,
        key: Option<String>,
        field: String,
        reason: String,
    },

    #[error("{location}: not valid state JSON: {reason}")]
    Parse { location: String, reason: String },

    #[error("{location}: {action} failed: {reason}")]
    Io {
        location: String,
        action: &'static str,
        reason: String,
    },

    #[error("{location}: {source}")]
    Remote {
        location: String,
        #[source]
        source: RemoteError,
    },

    #[error("{location}: '{command}' exited with code {exit_code}: {stderr}")]
    RemoteCommand {
        location: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

fn record_label(key: Option<&str>) -> String {
    key.map_or_else(|| "state file".to_string(), |k| format!("record '{k}'"))
}

impl StateError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Parse { .. } => ErrorKind::Validation,
            Self::Io { .. } => ErrorKind::Io,
            Self::Remote { source, .. } => source.kind(),
            Self::RemoteCommand { .. } => ErrorKind::Command,
        }
    }

    /// Field named by a validation failure.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

// ── Configuration errors ──────────────────────────────────────────────────────

/// Errors related to configuration value validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Key(#[from] KeyError),
}

// ── Port allocation ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortAllocationError {
    #[error("base port {0} is outside the range 1024-65535")]
    InvalidBase(u32),

    #[error("every port from {base} to 65535 is already recorded")]
    Exhausted { base: u16 },
}

// ── Credentials ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("password length {length} is below the minimum of {minimum}")]
    TooShort { length: usize, minimum: usize },
}

// ── Provisioning ──────────────────────────────────────────────────────────────

/// The ordered steps of a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoadConfig,
    Reconcile,
    DockerReadiness,
    AllocatePort,
    GenerateCredentials,
    CreateVolume,
    EnsureImage,
    StartContainer,
    WaitReady,
    CreateAppUser,
    CommitState,
}

impl Step {
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::LoadConfig => 1,
            Self::Reconcile => 2,
            Self::DockerReadiness => 3,
            Self::AllocatePort => 4,
            Self::GenerateCredentials => 5,
            Self::CreateVolume => 6,
            Self::EnsureImage => 7,
            Self::StartContainer => 8,
            Self::WaitReady => 9,
            Self::CreateAppUser => 10,
            Self::CommitState => 11,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::LoadConfig => "load configuration",
            Self::Reconcile => "reconcile state",
            Self::DockerReadiness => "ensure docker",
            Self::AllocatePort => "allocate port",
            Self::GenerateCredentials => "generate credentials",
            Self::CreateVolume => "create volume",
            Self::EnsureImage => "ensure image",
            Self::StartContainer => "start container",
            Self::WaitReady => "wait for readiness",
            Self::CreateAppUser => "create application user",
            Self::CommitState => "commit state",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.name())
    }
}

/// One concrete failure per orchestrator step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("configuration is invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("another outpost run holds {path}{}", holder.map(|p| format!(" (pid {p})")).unwrap_or_default())]
    Lock { path: String, holder: Option<u32> },

    #[error("{source}")]
    Remote {
        step: Step,
        #[source]
        source: RemoteError,
    },

    #[error("{source}")]
    State {
        step: Step,
        #[source]
        source: StateError,
    },

    #[error("docker installation on {host} exited with code {exit_code}: {stderr}")]
    DockerInstall {
        host: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("docker is still missing on {host} after a successful installation")]
    DockerMissingAfterInstall { host: String },

    #[error("docker daemon on {host} is not responding: {detail}")]
    DockerDaemon { host: String, detail: String },

    #[error("cannot allocate a port on {host}: {source}")]
    PortAllocation {
        host: String,
        #[source]
        source: PortAllocationError,
    },

    #[error("cannot generate credentials: {0}")]
    Credentials(#[from] CredentialError),

    #[error("cannot create volume '{volume}' on {host}: {stderr}")]
    VolumeCreate {
        host: String,
        volume: String,
        stderr: String,
    },

    #[error("cannot pull image '{image}' on {host}: {stderr}")]
    ImagePull {
        host: String,
        image: String,
        stderr: String,
    },

    #[error("cannot start container '{container}' on {host}: {stderr}")]
    ContainerStart {
        host: String,
        container: String,
        stderr: String,
    },

    #[error("container '{container}' on {host} is not running after start\n{logs}")]
    ContainerNotRunning {
        host: String,
        container: String,
        logs: String,
    },

    #[error("database in '{container}' on {host} did not answer within {}s", waited.as_secs())]
    ReadinessTimeout {
        host: String,
        container: String,
        waited: Duration,
    },

    #[error("container '{container}' on {host} stopped while waiting for readiness\n{logs}")]
    ServiceExited {
        host: String,
        container: String,
        logs: String,
    },

    #[error("cannot create user '{username}' for database '{database}' on {host}: {stderr}")]
    AppUserCreate {
        host: String,
        database: String,
        username: String,
        stderr: String,
    },

    #[error("container '{container}' is running on {host} but could not be recorded locally: {source}")]
    LocalStateWrite {
        host: String,
        container: String,
        volume: String,
        #[source]
        source: StateError,
    },
}

impl ProvisionError {
    /// Wrap a transport error raised during `step`.
    pub fn remote(step: Step) -> impl FnOnce(RemoteError) -> Self {
        move |source| Self::Remote { step, source }
    }

    /// Wrap a state error raised during `step`.
    pub fn state(step: Step) -> impl FnOnce(StateError) -> Self {
        move |source| Self::State { step, source }
    }

    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            Self::Config(_) | Self::Lock { .. } => Step::LoadConfig,
            Self::Remote { step, .. } | Self::State { step, .. } => *step,
            Self::DockerInstall { .. }
            | Self::DockerMissingAfterInstall { .. }
            | Self::DockerDaemon { .. } => Step::DockerReadiness,
            Self::PortAllocation { .. } => Step::AllocatePort,
            Self::Credentials(_) => Step::GenerateCredentials,
            Self::VolumeCreate { .. } => Step::CreateVolume,
            Self::ImagePull { .. } => Step::EnsureImage,
            Self::ContainerStart { .. } | Self::ContainerNotRunning { .. } => Step::StartContainer,
            Self::ReadinessTimeout { .. } | Self::ServiceExited { .. } => Step::WaitReady,
            Self::AppUserCreate { .. } => Step::CreateAppUser,
            Self::LocalStateWrite { .. } => Step::CommitState,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            Self::Remote { source, .. } => source.kind(),
            Self::State { source, .. } => source.kind(),
            Self::ReadinessTimeout { .. } => ErrorKind::Timeout,
            Self::DockerInstall { .. }
            | Self::VolumeCreate { .. }
            | Self::ImagePull { .. }
            | Self::ContainerStart { .. }
            | Self::AppUserCreate { .. } => ErrorKind::Command,
            Self::Lock { .. }
            | Self::DockerMissingAfterInstall { .. }
            | Self::DockerDaemon { .. }
            | Self::PortAllocation { .. }
            | Self::Credentials(_)
            | Self::ContainerNotRunning { .. }
            | Self::ServiceExited { .. }
            | Self::LocalStateWrite { .. } => ErrorKind::Provisioning,
        }
    }

    /// Remote host involved, or `None` for failures that never left the controller.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Config(_) | Self::Lock { .. } | Self::Credentials(_) => None,
            Self::Remote { source, .. } => source.host(),
            Self::State { source, .. } => match source {
                StateError::Remote { source, .. } => source.host(),
                _ => None,
            },
            Self::DockerInstall { host, .. }
            | Self::DockerMissingAfterInstall { host }
            | Self::DockerDaemon { host, .. }
            | Self::PortAllocation { host, .. }
            | Self::VolumeCreate { host, .. }
            | Self::ImagePull { host, .. }
            | Self::ContainerStart { host, .. }
            | Self::ContainerNotRunning { host, .. }
            | Self::ReadinessTimeout { host, .. }
            | Self::ServiceExited { host, .. }
            | Self::AppUserCreate { host, .. }
            | Self::LocalStateWrite { host, .. } => Some(host),
        }
    }

    /// Manual remedy suggested to the operator.
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::Config(_) => "fix the value in outpost.yaml and re-run".to_string(),
            Self::Lock { path, .. } => format!(
                "wait for the other run to finish; if none is running, delete {path}"
            ),
            Self::Remote { source, .. } => source.remediation(),
            Self::State { source, .. } => match source.kind() {
                ErrorKind::Validation => {
                    "repair or move the named state file by hand; outpost never rewrites a corrupt state file".to_string()
                }
                _ => "check permissions and free space for the state file, then re-run".to_string(),
            },
            Self::DockerInstall { host, .. } => format!(
                "install Docker on {host} manually (https://docs.docker.com/engine/install/) and ensure passwordless sudo for the configured user"
            ),
            Self::DockerMissingAfterInstall { host } => format!(
                "the installer reported success but 'docker' is not on PATH on {host}; inspect the host's package state"
            ),
            Self::DockerDaemon { host, .. } => format!(
                "start the daemon on {host} with 'sudo systemctl start docker' and check 'journalctl -u docker'"
            ),
            Self::PortAllocation { .. } => {
                "choose a lower base_port in outpost.yaml or destroy unused instances".to_string()
            }
            Self::Credentials(_) => "use a password length of at least 16".to_string(),
            Self::VolumeCreate { host, .. } => {
                format!("check free disk space and 'docker volume ls' on {host}")
            }
            Self::ImagePull { image, host, .. } => format!(
                "check that '{image}' exists and that {host} can reach the registry"
            ),
            Self::ContainerStart { container, host, .. } => format!(
                "if a stale container exists, remove it with 'docker rm -f {container}' on {host}; also check the port is free"
            ),
            Self::ContainerNotRunning { container, host, .. }
            | Self::ServiceExited { container, host, .. } => format!(
                "inspect 'docker logs {container}' on {host}; remove it with 'docker rm -f {container}' before retrying"
            ),
            Self::ReadinessTimeout { container, host, .. } => format!(
                "the container '{container}' is still running on {host}; raise readiness_timeout_secs or check 'docker logs {container}'"
            ),
            Self::AppUserCreate { host, database, .. } => format!(
                "the database container is running on {host}; create the user for '{database}' by hand or run 'outpost down' and retry"
            ),
            Self::LocalStateWrite {
                container, volume, host, ..
            } => format!(
                "nothing was recorded; remove 'docker rm -f {container}' and 'docker volume rm {volume}' on {host} by hand, fix the local state directory, then re-run"
            ),
        }
    }

    /// Full operator-facing report: step, host, message and remedy.
    #[must_use]
    pub fn report(&self) -> String {
        let host = self.host().unwrap_or("controller");
        format!(
            "{} failed on {host}: {self}\nHint: {}",
            self.step(),
            self.remediation()
        )
    }
}

// ── Destroy ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestroyError {
    #[error("no instance '{key}' in local or remote state")]
    NotFound { key: String },

    #[error("cannot remove container '{container}' on {host}: {stderr}")]
    ContainerRemove {
        host: String,
        container: String,
        stderr: String,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl DestroyError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::Validation,
            Self::ContainerRemove { .. } => ErrorKind::Command,
            Self::Remote(e) => e.kind(),
            Self::State(e) => e.kind(),
        }
    }
}

// ── Backup / restore ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackupError {
    #[error("no instance '{key}' in state")]
    NotFound { key: String },

    #[error("container '{container}' does not exist on {host}")]
    ContainerMissing { host: String, container: String },

    #[error("{host} ran out of disk space")]
    DiskFull { host: String },

    #[error("permission denied on {host}: {detail}")]
    PermissionDenied { host: String, detail: String },

    #[error("archive '{archive}' on {host} is corrupt: {detail}")]
    CorruptArchive {
        host: String,
        archive: String,
        detail: String,
    },

    #[error("archive '{archive}' does not exist on {host}")]
    ArchiveMissing { host: String, archive: String },

    #[error("{operation} on {host} exited with code {exit_code}: {stderr}")]
    Failed {
        host: String,
        operation: &'static str,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl BackupError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::Validation,
            Self::Remote(e) => e.kind(),
            Self::State(e) => e.kind(),
            Self::ContainerMissing { .. }
            | Self::DiskFull { .. }
            | Self::PermissionDenied { .. }
            | Self::CorruptArchive { .. }
            | Self::ArchiveMissing { .. }
            | Self::Failed { .. } => ErrorKind::Command,
        }
    }

    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::NotFound { .. } => "run 'outpost sync' or 'outpost up' first".to_string(),
            Self::ContainerMissing { container, .. } => format!(
                "the container '{container}' is gone; run 'outpost sync' to refresh state"
            ),
            Self::DiskFull { host } => format!("free disk space on {host} (~/.outpost/backups)"),
            Self::PermissionDenied { host, .. } => {
                format!("check ownership of ~/.outpost on {host}")
            }
            Self::CorruptArchive { .. } => "restore from a different archive".to_string(),
            Self::ArchiveMissing { .. } => {
                "list archives with 'ls ~/.outpost/backups' on the host".to_string()
            }
            Self::Failed { .. } => "inspect the error output above".to_string(),
            Self::Remote(e) => e.remediation(),
            Self::State(_) => "repair the state file named above".to_string(),
        }
    }
}
