//! Outpost CLI - provision MongoDB on a remote host over SSH

use clap::Parser;
use outpost_cli::cli::Cli;
use outpost_cli::commands;
use outpost_cli::output::json;
use tracing_subscriber::EnvFilter;

/// Log filter variable; defaults to `warn`.
const LOG_ENV: &str = "OUTPOST_LOG";

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = cli.run().await {
        let failure = commands::describe(&e);
        if json_mode {
            match json::format_error(&failure.message, failure.code) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("Error: {}", failure.message),
            }
        } else {
            eprintln!("Error: {}", failure.message);
            if let Some(hint) = failure.hint {
                eprintln!("Hint: {hint}");
            }
        }
        std::process::exit(1);
    }
}
