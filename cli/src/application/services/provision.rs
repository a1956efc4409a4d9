//! The provisioning orchestrator.
//!
//! Steps run strictly in order over one session. Nothing is rolled back:
//! a failure after step 6 leaves the created resources in place for the
//! operator (or `outpost down`) to deal with.

use std::time::Duration;

use chrono::Utc;
use outpost_common::InstanceRecord;
use tokio::time::Instant;

use crate::application::ports::{ProgressReporter, RemoteShell, StateStore};
use crate::application::services::docker::ensure_docker;
use crate::application::services::reconcile::{ReconcileOutcome, reconcile};
use crate::application::services::remote::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::classify::{UserCreation, classify_create_user};
use crate::domain::commands::{self, Docker, RunSpec};
use crate::domain::credentials::{self, DEFAULT_PASSWORD_LENGTH};
use crate::domain::instance::{app_username, container_name, database_name, volume_name};
use crate::domain::port::allocate;
use crate::domain::{
    ProvisionConfig, ProvisionError, ReconcileAction, RemoteError, StateError, Step,
};

pub const PULL_TIMEOUT: Duration = Duration::from_secs(600);
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);
/// Floor for a ping issued just before the readiness deadline.
pub const MIN_PING_TIMEOUT: Duration = Duration::from_secs(1);
pub const READINESS_INITIAL_DELAY: Duration = Duration::from_millis(500);
pub const READINESS_MAX_DELAY: Duration = Duration::from_secs(5);

/// How a provisioning run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Every step succeeded and both state copies hold the record.
    Created { record: InstanceRecord },
    /// Reconciliation found an existing instance; nothing was created.
    AlreadyExists {
        record: InstanceRecord,
        action: ReconcileAction,
    },
    /// Resources exist and local state has them, but the remote write failed.
    PartialSuccess {
        record: InstanceRecord,
        error: StateError,
    },
}

impl ProvisionOutcome {
    #[must_use]
    pub fn record(&self) -> &InstanceRecord {
        match self {
            Self::Created { record }
            | Self::AlreadyExists { record, .. }
            | Self::PartialSuccess { record, .. } => record,
        }
    }
}

/// Provision the instance described by `config` on the host behind `shell`.
///
/// # Errors
///
/// Returns the [`ProvisionError`] of the first failing step.
pub async fn provision(
    shell: &impl RemoteShell,
    local: &impl StateStore,
    remote: &impl StateStore,
    config: &ProvisionConfig,
    reporter: &impl ProgressReporter,
) -> Result<ProvisionOutcome, ProvisionError> {
    let host = shell.host().to_string();

    // 1. configuration
    config.validate()?;
    let key = config.key()?;

    // 2. reconcile
    reporter.step("reconciling state...");
    let ReconcileOutcome { action, record, .. } = reconcile(shell, local, remote, &key).await?;
    if let Some(record) = record {
        reporter.success(&format!("{key} already exists ({action})"));
        return Ok(ProvisionOutcome::AlreadyExists { record, action });
    }
    if action != ReconcileAction::NoAction {
        reporter.warn(&format!("{action} for {key}"));
    }

    // 3. docker
    let docker = ensure_docker(shell, &config.user, reporter).await?.docker;

    // 4. port
    let local_state = local.read().await.map_err(ProvisionError::state(Step::AllocatePort))?;
    let remote_state = remote
        .read()
        .await
        .map_err(ProvisionError::state(Step::AllocatePort))?;
    let allocation = allocate(&local_state, &remote_state, config.base_port).map_err(|source| {
        ProvisionError::PortAllocation {
            host: host.clone(),
            source,
        }
    })?;
    if allocation.near_limit {
        reporter.warn(&format!(
            "allocated port {} is close to the top of the port range",
            allocation.port
        ));
    }
    tracing::debug!(%key, port = allocation.port, "allocated port");

    // 5. credentials
    let admin_password = credentials::generate(DEFAULT_PASSWORD_LENGTH)?;
    let app_password = credentials::generate(DEFAULT_PASSWORD_LENGTH)?;

    // 6. volume
    let volume = volume_name(&key);
    ensure_volume(shell, docker, &volume, reporter).await?;

    // 7. image
    ensure_image(shell, docker, &config.image, reporter).await?;

    // 8. container
    let container = container_name(&key);
    reporter.step(&format!("starting {container} on port {}...", allocation.port));
    let started = shell
        .execute(
            &docker.run_database(&RunSpec {
                container: &container,
                volume: &volume,
                image: &config.image,
                bind_address: &config.bind_address,
                port: allocation.port,
                admin_password: &admin_password,
            }),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await
        .map_err(ProvisionError::remote(Step::StartContainer))?;
    if !started.success() {
        return Err(ProvisionError::ContainerStart {
            host,
            container,
            stderr: started.diagnostic().to_string(),
        });
    }
    let container_id = started.stdout().trim().to_string();
    if !is_running(shell, docker, &container)
        .await
        .map_err(ProvisionError::remote(Step::StartContainer))?
    {
        let logs = container_logs(shell, docker, &container).await;
        return Err(ProvisionError::ContainerNotRunning {
            host,
            container,
            logs,
        });
    }

    // 9. readiness
    reporter.step("waiting for the database to accept connections...");
    wait_ready(shell, docker, &container, &admin_password, config.readiness_timeout()).await?;

    // 10. application user
    let database = database_name(&key);
    let app_user = app_username(&database);
    let created = shell
        .execute(
            &docker.mongosh_eval(
                &container,
                &admin_password,
                &commands::create_user_script(&database, &app_user, &app_password),
            ),
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await
        .map_err(ProvisionError::remote(Step::CreateAppUser))?;
    match classify_create_user(&created) {
        UserCreation::Created => tracing::info!(%key, user = %app_user, "created application user"),
        UserCreation::AlreadyExists => {
            tracing::info!(%key, user = %app_user, "application user already exists");
        }
        UserCreation::Failed(stderr) => {
            return Err(ProvisionError::AppUserCreate {
                host,
                database,
                username: app_user,
                stderr,
            });
        }
    }

    // 11. commit, local first
    let record = InstanceRecord {
        port: allocation.port,
        database,
        app_username: app_user,
        app_password,
        admin_password,
        volume: volume.clone(),
        container_id,
        created_at: Utc::now(),
        last_backup_at: None,
    };
    if let Err(source) = local.set(&key, &record).await {
        return Err(ProvisionError::LocalStateWrite {
            host,
            container,
            volume,
            source,
        });
    }
    if let Err(error) = remote.set(&key, &record).await {
        tracing::warn!(%key, %error, "remote state write failed after local commit");
        return Ok(ProvisionOutcome::PartialSuccess { record, error });
    }

    reporter.success(&format!("{key} is running on {host}:{}", record.port));
    Ok(ProvisionOutcome::Created { record })
}

async fn ensure_volume(
    shell: &impl RemoteShell,
    docker: Docker,
    volume: &str,
    reporter: &impl ProgressReporter,
) -> Result<(), ProvisionError> {
    let at = || ProvisionError::remote(Step::CreateVolume);
    let existing = shell
        .execute(&docker.volume_inspect(volume), DEFAULT_COMMAND_TIMEOUT)
        .await
        .map_err(at())?;
    if existing.success() {
        tracing::info!(%volume, "reusing existing volume");
        reporter.info(&format!("reusing volume {volume}"));
        return Ok(());
    }
    let created = shell
        .execute(&docker.volume_create(volume), DEFAULT_COMMAND_TIMEOUT)
        .await
        .map_err(at())?;
    if !created.success() {
        return Err(ProvisionError::VolumeCreate {
            host: shell.host().to_string(),
            volume: volume.to_string(),
            stderr: created.diagnostic().to_string(),
        });
    }
    tracing::info!(%volume, "created volume");
    reporter.info(&format!("created volume {volume}"));
    Ok(())
}

async fn ensure_image(
    shell: &impl RemoteShell,
    docker: Docker,
    image: &str,
    reporter: &impl ProgressReporter,
) -> Result<(), ProvisionError> {
    let at = || ProvisionError::remote(Step::EnsureImage);
    let present = shell
        .execute(&docker.image_inspect(image), DEFAULT_COMMAND_TIMEOUT)
        .await
        .map_err(at())?;
    if present.success() {
        tracing::debug!(%image, "image already present");
        return Ok(());
    }
    reporter.step(&format!("pulling {image}..."));
    let pulled = shell
        .execute(&docker.pull(image), PULL_TIMEOUT)
        .await
        .map_err(at())?;
    if !pulled.success() {
        return Err(ProvisionError::ImagePull {
            host: shell.host().to_string(),
            image: image.to_string(),
            stderr: pulled.diagnostic().to_string(),
        });
    }
    Ok(())
}

/// Poll the database with exponential backoff until it answers a ping.
async fn wait_ready(
    shell: &impl RemoteShell,
    docker: Docker,
    container: &str,
    admin_password: &str,
    timeout: Duration,
) -> Result<(), ProvisionError> {
    let at = || ProvisionError::remote(Step::WaitReady);
    let host = shell.host();
    let ping = docker.mongosh_eval(container, admin_password, commands::ping_script());
    let start = Instant::now();
    let mut delay = READINESS_INITIAL_DELAY;
    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        let ping_timeout = PING_TIMEOUT.min(remaining).max(MIN_PING_TIMEOUT);
        match shell.execute(&ping, ping_timeout).await {
            Ok(result) if result.success() && result.stdout().trim() == "1" => return Ok(()),
            Ok(_) | Err(RemoteError::Timeout { .. }) => {}
            Err(e) => return Err(at()(e)),
        }
        if !is_running(shell, docker, container).await.map_err(at())? {
            let logs = container_logs(shell, docker, container).await;
            return Err(ProvisionError::ServiceExited {
                host: host.to_string(),
                container: container.to_string(),
                logs,
            });
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(ProvisionError::ReadinessTimeout {
                host: host.to_string(),
                container: container.to_string(),
                waited: elapsed,
            });
        }
        tokio::time::sleep(delay.min(timeout - elapsed)).await;
        delay = (delay * 2).min(READINESS_MAX_DELAY);
    }
}

async fn is_running(shell: &impl RemoteShell, docker: Docker, container: &str) -> Result<bool, RemoteError> {
    let result = shell
        .execute(&docker.inspect_running(container), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    Ok(result.success() && result.stdout().trim() == "true")
}

/// Last lines of the container log, or a note why they are unavailable.
async fn container_logs(shell: &impl RemoteShell, docker: Docker, container: &str) -> String {
    match shell.execute(&docker.logs(container), DEFAULT_COMMAND_TIMEOUT).await {
        Ok(result) if result.success() => result.stdout().trim_end().to_string(),
        Ok(result) => format!("(logs unavailable: {})", result.diagnostic()),
        Err(e) => format!("(logs unavailable: {e})"),
    }
}
