//! `outpost status [--probe]`: list recorded instances.

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::services::status::instance_status;
use crate::infra::ssh::{SshConnector, SshTarget};
use crate::infra::state::LocalStateStore;

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Ask the host whether each container is running
    #[arg(long)]
    pub probe: bool,
}

/// Run `outpost status`.
///
/// # Errors
///
/// Returns an error if the configuration or local state cannot be read.
pub async fn run(ctx: &AppContext, args: &StatusArgs) -> Result<()> {
    let config = ctx.config()?;
    let local = LocalStateStore::in_dir(&config.state_dir);
    let connector = args
        .probe
        .then(|| SshConnector::new(SshTarget::from_config(&config)));

    let statuses = instance_status(&local, connector.as_ref())
        .await
        .context("cannot read local state")?;
    ctx.renderer().status(&statuses)
}
