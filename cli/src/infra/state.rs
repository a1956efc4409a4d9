//! Local implementation of the `StateStore` port.
//!
//! `LocalStateStore` reads and writes `<state_dir>/state.json` using
//! `tokio::task::spawn_blocking`, with atomic write (temp file + rename)
//! so a reader never sees a torn file.

use std::path::{Path, PathBuf};

use outpost_common::StateCollection;

use crate::application::ports::StateStore;
use crate::domain::StateError;
use crate::domain::instance::LOCAL_STATE_FILE;
use crate::domain::state::{parse_collection, render_collection};
use crate::infra::fs::{create_private_dir, write_private};

/// State file on the controlling machine.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    /// Store at `<state_dir>/state.json`.
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::with_path(state_dir.join(LOCAL_STATE_FILE))
    }

    /// Create a store with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &'static str, e: &std::io::Error) -> StateError {
        StateError::Io {
            location: self.location(),
            action,
            reason: e.to_string(),
        }
    }

    fn read_sync(&self) -> Result<StateCollection, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateCollection::new()),
            Err(e) => return Err(self.io_error("read", &e)),
        };
        parse_collection(&self.location(), &content)
    }

    fn write_sync(&self, collection: &StateCollection) -> Result<(), StateError> {
        let content = render_collection(&self.location(), collection)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent).map_err(|e| self.io_error("create directory", &e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let result = write_private(&temp_path, content.as_bytes())
            .map_err(|e| self.io_error("write temp file", &e))
            .and_then(|()| {
                std::fs::rename(&temp_path, &self.path).map_err(|e| self.io_error("rename", &e))
            });
        match &result {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), records = collection.len(), "wrote local state");
            }
            Err(_) => {
                let _ = std::fs::remove_file(&temp_path);
            }
        }
        result
    }
}

impl StateStore for LocalStateStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<StateCollection, StateError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_sync())
            .await
            .map_err(|e| StateError::Io {
                location: self.location(),
                action: "read",
                reason: format!("state load task panicked: {e}"),
            })?
    }

    async fn write(&self, collection: &StateCollection) -> Result<(), StateError> {
        let store = self.clone();
        let collection = collection.clone();
        tokio::task::spawn_blocking(move || store.write_sync(&collection))
            .await
            .map_err(|e| StateError::Io {
                location: self.location(),
                action: "write",
                reason: format!("state save task panicked: {e}"),
            })?
    }
}
