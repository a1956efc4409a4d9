//! Explicit teardown of one instance.

use outpost_common::{InstanceKey, InstanceRecord};

use crate::application::ports::{ProgressReporter, RemoteShell, StateStore};
use crate::application::services::docker::detect_docker_access;
use crate::application::services::remote::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::classify::{is_no_such_container, is_no_such_volume};
use crate::domain::{DestroyError, StateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyOutcome {
    pub record: InstanceRecord,
    /// `false` when the container was already gone.
    pub container_removed: bool,
    pub volume_removed: bool,
    /// Remote bookkeeping failure; local state was still cleaned up.
    pub remote_state_error: Option<StateError>,
}

/// Remove the container (and with `purge` its volume) of `key`, then drop
/// the key from both state copies independently.
///
/// # Errors
///
/// [`DestroyError::NotFound`] when neither copy knows the key, a container
/// removal failure, or a local state failure. Remote state failures are
/// returned inside the outcome instead.
pub async fn destroy(
    shell: &impl RemoteShell,
    local: &impl StateStore,
    remote: &impl StateStore,
    key: &InstanceKey,
    purge: bool,
    reporter: &impl ProgressReporter,
) -> Result<DestroyOutcome, DestroyError> {
    let record = match remote.get(key).await? {
        Some(record) => record,
        None => local.get(key).await?.ok_or_else(|| DestroyError::NotFound {
            key: key.to_string(),
        })?,
    };

    let docker = detect_docker_access(shell).await?;

    reporter.step(&format!("removing container {}...", record.container_id));
    let removed = shell
        .execute(&docker.remove_container(&record.container_id), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    let container_removed = if removed.success() {
        true
    } else if is_no_such_container(removed.stderr()) {
        tracing::info!(%key, container = %record.container_id, "container already gone");
        false
    } else {
        return Err(DestroyError::ContainerRemove {
            host: shell.host().to_string(),
            container: record.container_id.clone(),
            stderr: removed.diagnostic().to_string(),
        });
    };

    let mut volume_removed = false;
    if purge {
        reporter.step(&format!("removing volume {}...", record.volume));
        let result = shell
            .execute(&docker.volume_remove(&record.volume), DEFAULT_COMMAND_TIMEOUT)
            .await?;
        if result.success() {
            volume_removed = true;
        } else if !is_no_such_volume(result.stderr()) {
            reporter.warn(&format!(
                "could not remove volume {}: {}",
                record.volume,
                result.diagnostic()
            ));
        }
    }

    let remote_state_error = match remote.remove(key).await {
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(%key, error = %e, "remote state removal failed");
            reporter.warn(&format!("remote state not updated: {e}"));
            Some(e)
        }
    };
    local.remove(key).await?;

    reporter.success(&format!("{key} destroyed"));
    Ok(DestroyOutcome {
        record,
        container_removed,
        volume_removed,
        remote_state_error,
    })
}
