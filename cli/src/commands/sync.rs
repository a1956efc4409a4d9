//! `outpost sync`: reconcile the two state copies of the configured instance.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::{ProgressReporter, RemoteConnector};
use crate::application::services::reconcile::reconcile;
use crate::application::services::remote::connect_with_retry;
use crate::infra::lock::InstanceLock;
use crate::infra::remote_state::RemoteStateStore;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;

/// Run `outpost sync`.
///
/// # Errors
///
/// Returns an error if either state copy cannot be read or written, or the
/// host cannot be reached.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let config = ctx.config()?;
    let key = config.key()?;
    let _lock = InstanceLock::acquire(&config.state_dir, &key)?;
    let reporter = ctx.reporter();

    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = SshConnector::new(SshTarget::from_config(&config));
    let session = connect_with_retry(&connector).await?;

    reporter.step(&format!("reconciling {key}..."));
    let outcome = {
        let remote = RemoteStateStore::new(&session);
        reconcile(&session, &local, &remote, &key).await
    };
    connector.disconnect(session).await;
    drop(reporter);

    let outcome = outcome?;
    tracing::info!(%key, action = %outcome.action, "sync finished");
    ctx.renderer().synced(&key, &outcome)
}
