//! Output formatting: terminal context, renderers and progress reporting.

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use chrono::{DateTime, Utc};
use console::Term;
use outpost_common::{InstanceKey, InstanceRecord};
use owo_colors::OwoColorize as _;
use serde::Serialize;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::{Reporter, TerminalReporter};
pub use styles::Styles;

use crate::application::services::backup::BackupOutcome;
use crate::application::services::destroy::DestroyOutcome;
use crate::application::services::reconcile::ReconcileOutcome;
use crate::application::services::status::InstanceStatus;
use crate::domain::instance::connection_uri;

/// Output context carrying styling and terminal state.
#[derive(Debug, Clone)]
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Suppress everything but errors.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let colored = !no_color && is_tty && std::env::var_os("NO_COLOR").is_none();
        Self {
            styles: if colored { Styles::colored() } else { Styles::default() },
            is_tty,
            quiet,
        }
    }

    fn line(&self, symbol: &str, style: owo_colors::Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", symbol.style(style));
        }
    }

    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.success, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line("!", self.styles.warning, msg);
    }

    pub fn info(&self, msg: &str) {
        self.line("ℹ", self.styles.info, msg);
    }

    /// Errors go to stderr and are never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.style(self.styles.header));
        }
    }

    /// Key/value line with the label dimmed and padded.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {:<12} {value}", key.style(self.styles.dim));
        }
    }
}

/// How `up` found the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Created,
    Exists,
    /// Created, but only one state copy recorded it.
    Partial,
}

/// What an application needs to reach its database.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub key: String,
    pub state: InstanceState,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub uri: String,
    pub created_at: DateTime<Utc>,
}

impl ConnectionInfo {
    #[must_use]
    pub fn new(key: &InstanceKey, host: &str, record: &InstanceRecord, state: InstanceState) -> Self {
        Self {
            key: key.to_string(),
            state,
            host: host.to_string(),
            port: record.port,
            database: record.database.clone(),
            username: record.app_username.clone(),
            password: record.app_password.clone(),
            uri: connection_uri(host, record),
            created_at: record.created_at,
        }
    }
}

/// Renderer for the active output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn connection(&self, info: &ConnectionInfo) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.connection(info);
                Ok(())
            }
            Self::Json(r) => r.connection(info),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn status(&self, statuses: &[InstanceStatus]) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.status(statuses);
                Ok(())
            }
            Self::Json(r) => r.status(statuses),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn destroyed(&self, key: &InstanceKey, outcome: &DestroyOutcome) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.destroyed(key, outcome);
                Ok(())
            }
            Self::Json(r) => r.destroyed(key, outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn backup(&self, key: &InstanceKey, outcome: &BackupOutcome) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.backup(key, outcome);
                Ok(())
            }
            Self::Json(r) => r.backup(key, outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn restored(&self, key: &InstanceKey, archive: &str) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.restored(key, archive);
                Ok(())
            }
            Self::Json(r) => r.restored(key, archive),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn synced(&self, key: &InstanceKey, outcome: &ReconcileOutcome) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.synced(key, outcome);
                Ok(())
            }
            Self::Json(r) => r.synced(key, outcome),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn version(&self, version: &str) -> anyhow::Result<()> {
        match self {
            Self::Human(r) => {
                r.version(version);
                Ok(())
            }
            Self::Json(r) => r.version(version),
        }
    }
}
