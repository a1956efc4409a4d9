//! `outpost backup`: dump the configured instance to an archive on its host.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::RemoteConnector;
use crate::application::services::backup::backup;
use crate::application::services::remote::connect_with_retry;
use crate::domain::BackupError;
use crate::infra::lock::InstanceLock;
use crate::infra::remote_state::RemoteStateStore;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;

/// Run `outpost backup`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or the dump fails.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let config = ctx.config()?;
    let key = config.key()?;
    let _lock = InstanceLock::acquire(&config.state_dir, &key)?;
    let reporter = ctx.reporter();

    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = SshConnector::new(SshTarget::from_config(&config));
    let session = connect_with_retry(&connector).await.map_err(BackupError::Remote)?;

    let outcome = {
        let remote = RemoteStateStore::new(&session);
        backup(&session, &local, &remote, &key, &reporter).await
    };
    connector.disconnect(session).await;
    drop(reporter);

    ctx.renderer().backup(&key, &outcome?)
}
