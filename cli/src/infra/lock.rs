//! Advisory per-instance lock held for the duration of a mutating command.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use outpost_common::InstanceKey;

use crate::domain::{ProvisionError, StateError, Step};
use crate::infra::fs::create_private_dir;

/// Exclusive lock on `<state_dir>/<project>-<environment>.lock`.
///
/// Released when dropped. The file itself is left behind; it only ever
/// holds the PID of the last holder.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Lock`] naming the holder's PID when another
    /// process holds it, or a state I/O error if the file cannot be opened.
    pub fn acquire(state_dir: &Path, key: &InstanceKey) -> Result<Self, ProvisionError> {
        let path = state_dir.join(format!("{}-{}.lock", key.project(), key.environment()));
        let io_error = |action: &'static str, e: std::io::Error| ProvisionError::State {
            step: Step::LoadConfig,
            source: StateError::Io {
                location: path.display().to_string(),
                action,
                reason: e.to_string(),
            },
        };

        create_private_dir(state_dir).map_err(|e| io_error("create", e))?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_error("open", e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(ProvisionError::Lock {
                path: path.display().to_string(),
                holder: read_holder(&mut file),
            });
        }

        file.set_len(0).map_err(|e| io_error("write", e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| io_error("write", e))?;
        write!(file, "{}", std::process::id()).map_err(|e| io_error("write", e))?;
        tracing::debug!(path = %path.display(), "instance lock acquired");
        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release instance lock");
        }
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}
