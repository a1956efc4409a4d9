//! Reconciliation of local state, remote state and the live container.

use outpost_common::{InstanceKey, InstanceRecord};

use crate::application::ports::{RemoteShell, StateStore};
use crate::application::services::remote::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::commands;
use crate::domain::reconcile::{ReconcileAction, ReconcilePlan, plan};
use crate::domain::{ProvisionError, RemoteError, Step};

/// Result of reconciling one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub changed: bool,
    pub action: ReconcileAction,
    /// The record that survived reconciliation, if any.
    pub record: Option<InstanceRecord>,
}

impl ReconcileOutcome {
    fn unchanged(record: Option<InstanceRecord>) -> Self {
        Self {
            changed: false,
            action: ReconcileAction::NoAction,
            record,
        }
    }

    fn changed(action: ReconcileAction, record: Option<InstanceRecord>) -> Self {
        Self {
            changed: true,
            action,
            record,
        }
    }
}

/// Bring the two state copies in line for `key`.
///
/// Remote state is authoritative for existence. A record known only
/// locally is checked against the live container before it is trusted.
///
/// # Errors
///
/// State read/write failures and transport failures, reported as step 2.
pub async fn reconcile(
    shell: &impl RemoteShell,
    local: &impl StateStore,
    remote: &impl StateStore,
    key: &InstanceKey,
) -> Result<ReconcileOutcome, ProvisionError> {
    let state_err = || ProvisionError::state(Step::Reconcile);
    let local_record = local.get(key).await.map_err(state_err())?;
    let remote_record = remote.get(key).await.map_err(state_err())?;

    let decision = plan(local_record.as_ref(), remote_record.as_ref());
    match (decision, local_record, remote_record) {
        (ReconcilePlan::AdoptRemote, _, Some(record)) => {
            local.set(key, &record).await.map_err(state_err())?;
            tracing::info!(%key, "adopted record from remote state");
            Ok(ReconcileOutcome::changed(
                ReconcileAction::AdoptedFromRemote,
                Some(record),
            ))
        }
        (ReconcilePlan::VerifyLocal, Some(record), _) => {
            let running = container_running(shell, &record.container_id)
                .await
                .map_err(ProvisionError::remote(Step::Reconcile))?;
            if running {
                remote.set(key, &record).await.map_err(state_err())?;
                tracing::info!(%key, container = %record.container_id, "restored remote record from local");
                Ok(ReconcileOutcome::changed(
                    ReconcileAction::RestoredRemoteFromLocal,
                    Some(record),
                ))
            } else {
                local.remove(key).await.map_err(state_err())?;
                tracing::info!(%key, container = %record.container_id, "removed stale local record");
                Ok(ReconcileOutcome::changed(ReconcileAction::RemovedStaleLocal, None))
            }
        }
        (ReconcilePlan::Conflict { fields }, _, Some(record)) => {
            local.set(key, &record).await.map_err(state_err())?;
            tracing::warn!(%key, fields = ?fields, "local record conflicted with remote, remote kept");
            Ok(ReconcileOutcome::changed(
                ReconcileAction::ConflictResolved { fields },
                Some(record),
            ))
        }
        (ReconcilePlan::InSync, _, record) => Ok(ReconcileOutcome::unchanged(record)),
        _ => Ok(ReconcileOutcome::unchanged(None)),
    }
}

/// Whether the container `reference` exists and is running.
///
/// Any command failure (docker missing, daemon down, unknown container)
/// counts as not running; only transport failures are errors.
///
/// # Errors
///
/// Returns the transport error if the probe could not be executed.
pub async fn container_running(shell: &impl RemoteShell, reference: &str) -> Result<bool, RemoteError> {
    let result = shell
        .execute(&commands::probe_running(reference), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    Ok(result.success() && result.stdout().trim() == "true")
}
