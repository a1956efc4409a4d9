//! CLI argument parsing with clap derive.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Provision MongoDB on a remote host over SSH
#[derive(Debug, Parser)]
#[command(
    name = "outpost",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to outpost.yaml
    #[arg(long, global = true, env = "OUTPOST_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the environment named in the configuration
    #[arg(long = "env", global = true, value_name = "NAME")]
    pub environment: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision the configured database, or show it if it exists
    Up,

    /// Remove the configured database
    Down(commands::down::DownArgs),

    /// List recorded databases
    Status(commands::status::StatusArgs),

    /// Reconcile local and remote state for the configured database
    Sync,

    /// Dump the configured database to an archive on its host
    Backup,

    /// Restore the configured database from an archive on its host
    Restore(commands::restore::RestoreArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            environment,
            json,
            quiet,
            no_color,
            yes,
            command,
        } = self;
        let ctx = AppContext::new(AppFlags {
            config,
            environment,
            json,
            quiet,
            no_color,
            yes,
        });

        match command {
            Command::Up => commands::up::run(&ctx).await,
            Command::Down(args) => commands::down::run(&ctx, &args).await,
            Command::Status(args) => commands::status::run(&ctx, &args).await,
            Command::Sync => commands::sync::run(&ctx).await,
            Command::Backup => commands::backup::run(&ctx).await,
            Command::Restore(args) => commands::restore::run(&ctx, &args).await,
            Command::Version => commands::version::run(&ctx),
        }
    }
}
