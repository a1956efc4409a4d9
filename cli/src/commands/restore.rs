//! `outpost restore <archive>`: load an archive back into the instance.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::RemoteConnector;
use crate::application::services::backup::restore;
use crate::application::services::remote::connect_with_retry;
use crate::domain::BackupError;
use crate::infra::lock::InstanceLock;
use crate::infra::remote_state::RemoteStateStore;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;

/// Arguments for the restore command.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Archive path on the remote host, as printed by `outpost backup`
    pub archive: String,
}

/// Run `outpost restore`.
///
/// # Errors
///
/// Returns an error if the archive is missing or the restore fails.
pub async fn run(ctx: &AppContext, args: &RestoreArgs) -> Result<()> {
    let config = ctx.config()?;
    let key = config.key()?;
    let _lock = InstanceLock::acquire(&config.state_dir, &key)?;

    let prompt = format!("Replace the contents of {key} with {}?", args.archive);
    if !ctx.non_interactive && !ctx.confirm(&prompt, false)? {
        ctx.output.info("Cancelled.");
        return Ok(());
    }

    let reporter = ctx.reporter();
    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = SshConnector::new(SshTarget::from_config(&config));
    let session = connect_with_retry(&connector).await.map_err(BackupError::Remote)?;

    let result = {
        let remote = RemoteStateStore::new(&session);
        restore(&session, &local, &remote, &key, &args.archive, &reporter).await
    };
    connector.disconnect(session).await;
    drop(reporter);

    result?;
    ctx.renderer().restored(&key, &args.archive)
}
