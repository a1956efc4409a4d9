//! Remote implementation of the `StateStore` port.
//!
//! Reads with `test -f` + `cat` and writes by piping the document into a
//! shell snippet that does the temp-file + rename dance on the host.

use std::time::Duration;

use outpost_common::StateCollection;

use crate::application::ports::{RemoteShell, StateStore};
use crate::domain::instance::REMOTE_STATE_PATH;
use crate::domain::remote::command_label;
use crate::domain::state::{parse_collection, render_collection};
use crate::domain::{CommandResult, StateError, commands};

const STATE_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// State file on the managed host, accessed through an open session.
pub struct RemoteStateStore<'s, S> {
    shell: &'s S,
    path: String,
}

impl<'s, S: RemoteShell> RemoteStateStore<'s, S> {
    /// Store at the standard path in the remote user's home directory.
    pub fn new(shell: &'s S) -> Self {
        Self::with_path(shell, REMOTE_STATE_PATH)
    }

    pub fn with_path(shell: &'s S, path: &str) -> Self {
        Self {
            shell,
            path: path.to_string(),
        }
    }

    fn command_failed(&self, command: &str, result: &CommandResult) -> StateError {
        StateError::RemoteCommand {
            location: self.location(),
            command: command_label(command),
            exit_code: result.exit_code(),
            stderr: result.diagnostic().to_string(),
        }
    }

    fn transport(&self, source: crate::domain::RemoteError) -> StateError {
        StateError::Remote {
            location: self.location(),
            source,
        }
    }
}

impl<S: RemoteShell> StateStore for RemoteStateStore<'_, S> {
    fn location(&self) -> String {
        format!("{}:~/{}", self.shell.host(), self.path)
    }

    async fn read(&self) -> Result<StateCollection, StateError> {
        let exists = self
            .shell
            .execute(&commands::file_exists(&self.path), STATE_IO_TIMEOUT)
            .await
            .map_err(|e| self.transport(e))?;
        if !exists.success() {
            return Ok(StateCollection::new());
        }
        let cat = commands::read_file(&self.path);
        let content = self
            .shell
            .execute(&cat, STATE_IO_TIMEOUT)
            .await
            .map_err(|e| self.transport(e))?;
        if !content.success() {
            return Err(self.command_failed(&cat, &content));
        }
        parse_collection(&self.location(), content.stdout())
    }

    async fn write(&self, collection: &StateCollection) -> Result<(), StateError> {
        let document = render_collection(&self.location(), collection)?;
        let command = commands::write_file_atomic(&self.path);
        let result = self
            .shell
            .execute_with_input(&command, document.as_bytes(), STATE_IO_TIMEOUT)
            .await
            .map_err(|e| self.transport(e))?;
        if !result.success() {
            return Err(self.command_failed(&command, &result));
        }
        tracing::debug!(location = %self.location(), records = collection.len(), "wrote remote state");
        Ok(())
    }
}
