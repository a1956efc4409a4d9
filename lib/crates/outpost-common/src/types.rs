use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::InstanceKey;

/// One provisioned database instance as recorded in a state file.
///
/// Created only after every remote resource exists; afterwards the only
/// field that changes is `last_backup_at`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Host port the database is published on.
    pub port: u16,
    /// Database the application identity is scoped to.
    pub database: String,
    /// Least-privilege application user.
    pub app_username: String,
    pub app_password: String,
    /// Password of the administrative (root) user.
    pub admin_password: String,
    /// Docker volume holding the data directory.
    pub volume: String,
    /// Docker container ID returned by `docker run`.
    pub container_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("port", &self.port)
            .field("database", &self.database)
            .field("app_username", &self.app_username)
            .field("app_password", &"<redacted>")
            .field("admin_password", &"<redacted>")
            .field("volume", &self.volume)
            .field("container_id", &self.container_id)
            .field("created_at", &self.created_at)
            .field("last_backup_at", &self.last_backup_at)
            .finish()
    }
}

/// Mapping from instance key to record, serialized as a JSON object.
///
/// Backed by a `BTreeMap` so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateCollection {
    records: BTreeMap<InstanceKey, InstanceRecord>,
}

impl StateCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &InstanceKey) -> Option<&InstanceRecord> {
        self.records.get(key)
    }

    /// Insert or replace a whole record, returning the previous one.
    pub fn insert(&mut self, key: InstanceKey, record: InstanceRecord) -> Option<InstanceRecord> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, key: &InstanceKey) -> Option<InstanceRecord> {
        self.records.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.records.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstanceKey, &InstanceRecord)> {
        self.records.iter()
    }

    /// Every port recorded in this collection.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.records.values().map(|r| r.port)
    }
}

impl FromIterator<(InstanceKey, InstanceRecord)> for StateCollection {
    fn from_iter<T: IntoIterator<Item = (InstanceKey, InstanceRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
