//! Instance listing with optional live probes.

use outpost_common::{InstanceKey, InstanceRecord};

use crate::application::ports::{RemoteConnector, StateStore};
use crate::application::services::remote::{DEFAULT_COMMAND_TIMEOUT, run_with_retry};
use crate::domain::StateError;
use crate::domain::commands;

/// Observed state of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    NotProbed,
    Running,
    Stopped,
    /// The host could not be asked.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    pub key: InstanceKey,
    pub record: InstanceRecord,
    pub liveness: Liveness,
}

/// Every record in `local`, optionally probed through `connector`.
///
/// Each probe is a separate connect+execute+disconnect with the usual
/// retry policy.
///
/// # Errors
///
/// Returns the state error if the local collection cannot be read.
pub async fn instance_status<C: RemoteConnector>(
    local: &impl StateStore,
    connector: Option<&C>,
) -> Result<Vec<InstanceStatus>, StateError> {
    let collection = local.read().await?;
    let mut statuses = Vec::with_capacity(collection.len());
    for (key, record) in collection.iter() {
        let liveness = match connector {
            None => Liveness::NotProbed,
            Some(connector) => probe(connector, &record.container_id).await,
        };
        statuses.push(InstanceStatus {
            key: key.clone(),
            record: record.clone(),
            liveness,
        });
    }
    Ok(statuses)
}

async fn probe<C: RemoteConnector>(connector: &C, container: &str) -> Liveness {
    match run_with_retry(
        connector,
        &commands::probe_running(container),
        DEFAULT_COMMAND_TIMEOUT,
    )
    .await
    {
        Ok(result) if result.success() && result.stdout().trim() == "true" => Liveness::Running,
        Ok(_) => Liveness::Stopped,
        Err(e) => {
            tracing::warn!(%container, error = %e, "status probe failed");
            Liveness::Unreachable(e.to_string())
        }
    }
}
