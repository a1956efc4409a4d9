//! `outpost version`

use anyhow::Result;

use crate::app::AppContext;

/// Run the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(ctx: &AppContext) -> Result<()> {
    ctx.renderer().version(env!("CARGO_PKG_VERSION"))
}
