//! `outpost down [--purge]`: remove the configured instance.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::RemoteConnector;
use crate::application::services::destroy::destroy;
use crate::application::services::remote::connect_with_retry;
use crate::domain::DestroyError;
use crate::infra::lock::InstanceLock;
use crate::infra::remote_state::RemoteStateStore;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;

/// Arguments for the down command.
#[derive(Debug, Args)]
pub struct DownArgs {
    /// Also delete the data volume (irreversible)
    #[arg(long)]
    pub purge: bool,
}

/// Run `outpost down`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or its container cannot be
/// removed.
pub async fn run(ctx: &AppContext, args: &DownArgs) -> Result<()> {
    let config = ctx.config()?;
    let key = config.key()?;
    let _lock = InstanceLock::acquire(&config.state_dir, &key)?;

    let prompt = if args.purge {
        format!("Remove {key} on {} and DELETE its data volume?", config.host)
    } else {
        format!("Remove {key} on {}? The data volume is kept.", config.host)
    };
    if !ctx.non_interactive && !ctx.confirm(&prompt, false)? {
        ctx.output.info("Cancelled.");
        return Ok(());
    }

    let reporter = ctx.reporter();
    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = SshConnector::new(SshTarget::from_config(&config));
    let session = connect_with_retry(&connector).await.map_err(DestroyError::Remote)?;

    let outcome = {
        let remote = RemoteStateStore::new(&session);
        destroy(&session, &local, &remote, &key, args.purge, &reporter).await
    };
    connector.disconnect(session).await;
    drop(reporter);

    ctx.renderer().destroyed(&key, &outcome?)
}
