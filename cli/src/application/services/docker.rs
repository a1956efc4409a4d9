//! Docker readiness: installed, daemon answering, usable by the login user.

use std::time::Duration;

use semver::Version;

use crate::application::ports::{ProgressReporter, RemoteShell};
use crate::application::services::remote::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::classify::{DockerProbe, classify_docker_probe};
use crate::domain::commands::{self, Docker};
use crate::domain::docker::{MIN_DOCKER_VERSION, is_below_minimum, parse_docker_version};
use crate::domain::{ProvisionError, RemoteError, Step};

pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DAEMON_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DAEMON_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Result of [`ensure_docker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerReadiness {
    /// `None` when the binary resolves but its version could not be parsed.
    pub version: Option<Version>,
    pub installed_now: bool,
    /// How later commands must invoke docker.
    pub docker: Docker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Installation {
    Missing,
    Present(Option<Version>),
}

/// Make sure docker is installed, its daemon answers and the login user
/// can drive it, installing or starting it when needed.
///
/// A version below [`MIN_DOCKER_VERSION`] and a failed docker-group fixup
/// are warnings only.
///
/// # Errors
///
/// Returns a [`ProvisionError`] for step 3 when installation fails, the
/// binary is still missing afterwards, or the daemon never answers.
pub async fn ensure_docker(
    shell: &impl RemoteShell,
    user: &str,
    reporter: &impl ProgressReporter,
) -> Result<DockerReadiness, ProvisionError> {
    let host = shell.host().to_string();
    let at = || ProvisionError::remote(Step::DockerReadiness);

    reporter.step("checking docker installation...");
    let mut installed_now = false;
    let mut installation = probe_installation(shell).await.map_err(at())?;
    if installation == Installation::Missing {
        reporter.step("installing docker (this can take a few minutes)...");
        let result = shell
            .execute(&commands::install_docker(), INSTALL_TIMEOUT)
            .await
            .map_err(at())?;
        if !result.success() {
            return Err(ProvisionError::DockerInstall {
                host,
                exit_code: result.exit_code(),
                stderr: result.diagnostic().to_string(),
            });
        }
        installation = probe_installation(shell).await.map_err(at())?;
        installed_now = true;
    }
    let Installation::Present(version) = installation else {
        return Err(ProvisionError::DockerMissingAfterInstall { host });
    };

    match &version {
        Some(v) if is_below_minimum(v) => {
            let message = format!(
                "docker {v} on {host} is older than {MIN_DOCKER_VERSION}; continuing anyway"
            );
            tracing::warn!(%host, version = %v, "docker below minimum version");
            reporter.warn(&message);
        }
        Some(v) => tracing::debug!(%host, version = %v, "docker version"),
        None => reporter.warn("could not parse the docker version; continuing"),
    }

    let direct = Docker::new(false);
    let mut probe = probe_daemon(shell, direct).await.map_err(at())?;
    if matches!(probe, DockerProbe::DaemonUnavailable(_) | DockerProbe::Failed(_)) {
        reporter.step("starting docker daemon...");
        let result = shell
            .execute(commands::start_docker_daemon(), DEFAULT_COMMAND_TIMEOUT)
            .await
            .map_err(at())?;
        if !result.success() {
            tracing::warn!(%host, stderr = result.diagnostic(), "starting docker daemon failed");
        }
        tokio::time::sleep(DAEMON_SETTLE_DELAY).await;
        probe = probe_daemon(shell, direct).await.map_err(at())?;
    }

    let docker = match probe {
        DockerProbe::Ready => direct,
        DockerProbe::PermissionDenied => {
            grant_group_access(shell, user, reporter).await;
            Docker::new(true)
        }
        DockerProbe::DaemonUnavailable(detail) | DockerProbe::Failed(detail) => {
            return Err(ProvisionError::DockerDaemon { host, detail });
        }
    };

    reporter.success("docker is ready");
    Ok(DockerReadiness {
        version,
        installed_now,
        docker,
    })
}

/// Decide whether docker must be run through `sudo -n` for this user.
///
/// # Errors
///
/// Only transport failures; a failed probe falls back to sudo.
pub async fn detect_docker_access(shell: &impl RemoteShell) -> Result<Docker, RemoteError> {
    let direct = Docker::new(false);
    match probe_daemon(shell, direct).await? {
        DockerProbe::Ready => Ok(direct),
        _ => Ok(Docker::new(true)),
    }
}

async fn probe_installation(shell: &impl RemoteShell) -> Result<Installation, RemoteError> {
    let result = shell
        .execute(commands::docker_version(), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    if result.success() {
        if let Some(version) = parse_docker_version(result.stdout()) {
            return Ok(Installation::Present(Some(version)));
        }
    }
    let resolves = shell
        .execute(commands::docker_resolves(), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    if resolves.success() {
        Ok(Installation::Present(None))
    } else {
        Ok(Installation::Missing)
    }
}

async fn probe_daemon(shell: &impl RemoteShell, docker: Docker) -> Result<DockerProbe, RemoteError> {
    match shell.execute(&docker.list_containers(), DAEMON_PROBE_TIMEOUT).await {
        Ok(result) => Ok(classify_docker_probe(&result)),
        Err(RemoteError::Timeout { .. }) => Ok(DockerProbe::DaemonUnavailable(format!(
            "no answer within {}s",
            DAEMON_PROBE_TIMEOUT.as_secs()
        ))),
        Err(e) => Err(e),
    }
}

/// Add `user` to the docker group. Failures are reported but never abort.
async fn grant_group_access(shell: &impl RemoteShell, user: &str, reporter: &impl ProgressReporter) {
    let host = shell.host();
    match shell
        .execute(&commands::add_user_to_docker_group(user), DEFAULT_COMMAND_TIMEOUT)
        .await
    {
        Ok(result) if result.success() => reporter.warn(&format!(
            "added {user} to the docker group on {host}; this takes effect on the next login, using sudo for now"
        )),
        Ok(result) => {
            tracing::warn!(%host, %user, stderr = result.diagnostic(), "usermod failed");
            reporter.warn(&format!(
                "could not add {user} to the docker group on {host}; using sudo"
            ));
        }
        Err(e) => {
            tracing::warn!(%host, %user, error = %e, "usermod failed");
            reporter.warn(&format!(
                "could not add {user} to the docker group on {host}; using sudo"
            ));
        }
    }
}
