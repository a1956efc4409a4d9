//! Names and paths derived from an instance key.

use chrono::{DateTime, Utc};
use outpost_common::{InstanceKey, InstanceRecord};

pub const ADMIN_USERNAME: &str = "admin";
/// Port the database listens on inside the container.
pub const SERVICE_PORT: u16 = 27017;
pub const DATA_DIR: &str = "/data/db";
/// Remote state file, relative to the remote user's home directory.
pub const REMOTE_STATE_PATH: &str = ".outpost/state.json";
pub const REMOTE_BACKUP_DIR: &str = ".outpost/backups";
pub const LOCAL_STATE_FILE: &str = "state.json";

#[must_use]
pub fn container_name(key: &InstanceKey) -> String {
    format!("outpost-{}-{}", key.project(), key.environment())
}

#[must_use]
pub fn volume_name(key: &InstanceKey) -> String {
    format!("{}-data", container_name(key))
}

/// Database name: `<project>_<environment>` with dashes turned into underscores.
#[must_use]
pub fn database_name(key: &InstanceKey) -> String {
    format!("{}_{}", key.project(), key.environment()).replace('-', "_")
}

#[must_use]
pub fn app_username(database: &str) -> String {
    format!("{database}_app")
}

/// Remote path of a new backup archive taken at `at`.
#[must_use]
pub fn backup_archive_path(key: &InstanceKey, at: DateTime<Utc>) -> String {
    format!(
        "{REMOTE_BACKUP_DIR}/{}-{}-{}.archive.gz",
        key.project(),
        key.environment(),
        at.format("%Y%m%dT%H%M%SZ")
    )
}

/// `mongodb://` URI for the application identity of `record` on `host`.
#[must_use]
pub fn connection_uri(host: &str, record: &InstanceRecord) -> String {
    format!(
        "mongodb://{}:{}@{host}:{}/{}?authSource={}",
        record.app_username, record.app_password, record.port, record.database, record.database
    )
}
