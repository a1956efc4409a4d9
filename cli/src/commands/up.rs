//! `outpost up`: provision (or find) the configured instance.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::{ProgressReporter, RemoteConnector};
use crate::application::services::provision::{ProvisionOutcome, provision};
use crate::application::services::remote::connect_with_retry;
use crate::infra::lock::InstanceLock;
use crate::infra::remote_state::RemoteStateStore;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;
use crate::output::{ConnectionInfo, InstanceState};

/// Run `outpost up`.
///
/// # Errors
///
/// Returns the failing step's error, or a partial-success error after the
/// connection details were printed.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let config = ctx.config()?;
    let key = config.key()?;
    let _lock = InstanceLock::acquire(&config.state_dir, &key)?;
    let reporter = ctx.reporter();

    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = SshConnector::new(SshTarget::from_config(&config));

    reporter.step(&format!("connecting to {}@{}...", config.user, config.host));
    let session = connect_with_retry(&connector).await?;
    reporter.success(&format!("connected to {}", config.host));

    let outcome = {
        let remote = RemoteStateStore::new(&session);
        provision(&session, &local, &remote, &config, &reporter).await
    };
    connector.disconnect(session).await;
    drop(reporter);
    let outcome = outcome?;

    let state = match &outcome {
        ProvisionOutcome::Created { .. } => InstanceState::Created,
        ProvisionOutcome::AlreadyExists { .. } => InstanceState::Exists,
        ProvisionOutcome::PartialSuccess { .. } => InstanceState::Partial,
    };
    let info = ConnectionInfo::new(&key, &config.host, outcome.record(), state);
    ctx.renderer().connection(&info)?;

    if let ProvisionOutcome::PartialSuccess { error, .. } = outcome {
        if !ctx.is_json() {
            ctx.output.warn(&format!("remote state was not updated: {error}"));
            ctx.output.info("Run: outpost sync");
        }
        anyhow::bail!("{key} is running but only recorded locally; run 'outpost sync'");
    }
    Ok(())
}
