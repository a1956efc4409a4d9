//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `outpost_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use outpost_common::{InstanceKey, InstanceRecord, StateCollection};
use thiserror::Error;

use crate::domain::{CommandResult, ProvisionConfig, RemoteError, StateError};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Failure to run a local process at all (as opposed to a non-zero exit).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output, RunnerError>;

    /// Run a program with stdin piped from `input`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
        timeout: Duration,
    ) -> Result<Output, RunnerError>;
}

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// An open, authenticated session to one host.
///
/// A non-zero exit code is returned in the [`CommandResult`]; only transport
/// failures and timeouts are errors.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Host this session is connected to.
    fn host(&self) -> &str;

    /// Run `command` through the remote user's shell.
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandResult, RemoteError>;

    /// Run `command` with `input` piped to its stdin.
    async fn execute_with_input(
        &self,
        command: &str,
        input: &[u8],
        timeout: Duration,
    ) -> Result<CommandResult, RemoteError>;
}

/// Opens and closes sessions. A session is consumed by `disconnect` and can
/// never be used afterwards.
#[allow(async_fn_in_trait)]
pub trait RemoteConnector {
    type Session: RemoteShell;

    fn host(&self) -> &str;

    async fn connect(&self) -> Result<Self::Session, RemoteError>;

    async fn disconnect(&self, session: Self::Session);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Loads the provisioning configuration for one invocation.
pub trait ConfigStore {
    /// Load, normalise and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed or
    /// fails validation.
    fn load(&self) -> anyhow::Result<ProvisionConfig>;

    /// Path the configuration is read from.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    fn path(&self) -> anyhow::Result<PathBuf>;
}

// ── State Port ────────────────────────────────────────────────────────────────

/// One copy of the state collection. `get`/`set`/`remove` are
/// read-modify-write over whole records.
#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Human-readable location used in error messages.
    fn location(&self) -> String;

    /// Read the collection; a missing file is an empty collection.
    async fn read(&self) -> Result<StateCollection, StateError>;

    /// Atomically replace the collection.
    async fn write(&self, collection: &StateCollection) -> Result<(), StateError>;

    async fn get(&self, key: &InstanceKey) -> Result<Option<InstanceRecord>, StateError> {
        Ok(self.read().await?.get(key).cloned())
    }

    async fn set(&self, key: &InstanceKey, record: &InstanceRecord) -> Result<(), StateError> {
        let mut collection = self.read().await?;
        collection.insert(key.clone(), record.clone());
        self.write(&collection).await
    }

    /// Remove `key`, returning whether it was present.
    async fn remove(&self, key: &InstanceKey) -> Result<bool, StateError> {
        let mut collection = self.read().await?;
        let removed = collection.remove(key).is_some();
        if removed {
            self.write(&collection).await?;
        }
        Ok(removed)
    }
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit a neutral note that does not settle the current step.
    fn info(&self, message: &str);
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
}
