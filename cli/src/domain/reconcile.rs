//! Pure decision table for reconciling local and remote records.

use std::fmt;

use outpost_common::InstanceRecord;

/// What the reconciler has to do for one instance key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Neither store knows the key.
    Nothing,
    /// Only the remote store has it: copy it to local.
    AdoptRemote,
    /// Only the local store has it: check whether the container still runs.
    VerifyLocal,
    /// Both have it but identifying fields differ: remote wins.
    Conflict { fields: Vec<&'static str> },
    /// Both agree on the identifying fields.
    InSync,
}

/// Outcome reported after reconciliation ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    NoAction,
    AdoptedFromRemote,
    RestoredRemoteFromLocal,
    RemovedStaleLocal,
    ConflictResolved { fields: Vec<&'static str> },
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAction => f.write_str("no action"),
            Self::AdoptedFromRemote => f.write_str("adopted record from remote"),
            Self::RestoredRemoteFromLocal => f.write_str("restored remote record from local"),
            Self::RemovedStaleLocal => f.write_str("removed stale local record"),
            Self::ConflictResolved { fields } => {
                write!(f, "replaced local record with remote ({})", fields.join(", "))
            }
        }
    }
}

/// Decide what to do given the two views of a key.
#[must_use]
pub fn plan(local: Option<&InstanceRecord>, remote: Option<&InstanceRecord>) -> ReconcilePlan {
    match (local, remote) {
        (None, None) => ReconcilePlan::Nothing,
        (None, Some(_)) => ReconcilePlan::AdoptRemote,
        (Some(_), None) => ReconcilePlan::VerifyLocal,
        (Some(l), Some(r)) => {
            let fields = conflicting_fields(l, r);
            if fields.is_empty() {
                ReconcilePlan::InSync
            } else {
                ReconcilePlan::Conflict { fields }
            }
        }
    }
}

/// Identifying fields that differ between two records.
#[must_use]
pub fn conflicting_fields(local: &InstanceRecord, remote: &InstanceRecord) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if local.port != remote.port {
        fields.push("port");
    }
    if local.container_id != remote.container_id {
        fields.push("container_id");
    }
    if local.database != remote.database {
        fields.push("database");
    }
    fields
}
