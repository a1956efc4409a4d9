//! Human-readable terminal renderer.

use chrono::{DateTime, Utc};
use outpost_common::InstanceKey;
use owo_colors::OwoColorize as _;

use crate::application::services::backup::BackupOutcome;
use crate::application::services::destroy::DestroyOutcome;
use crate::application::services::reconcile::ReconcileOutcome;
use crate::application::services::status::{InstanceStatus, Liveness};
use crate::output::{ConnectionInfo, InstanceState, OutputContext};

const SHORT_ID_LEN: usize = 12;

/// Renders results as terminal text using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn connection(&self, info: &ConnectionInfo) {
        match info.state {
            InstanceState::Created => self.ctx.success(&format!("{} is ready", info.key)),
            InstanceState::Exists => self.ctx.info(&format!("{} already exists", info.key)),
            InstanceState::Partial => self.ctx.warn(&format!("{} was created but not fully recorded", info.key)),
        }
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.kv("Host", &info.host);
        self.ctx.kv("Port", &info.port.to_string());
        self.ctx.kv("Database", &info.database);
        self.ctx.kv("User", &info.username);
        self.ctx.kv("Created", &timestamp(info.created_at));
        println!();
        println!("  {}", info.uri.style(self.ctx.styles.highlight));
    }

    pub fn status(&self, statuses: &[InstanceStatus]) {
        if statuses.is_empty() {
            self.ctx.info("No instances recorded. Create one with: outpost up");
            return;
        }
        let probed = statuses.iter().any(|s| s.liveness != Liveness::NotProbed);
        let mut header = format!(
            "{:<24} {:>5}  {:<20} {:<12}  {:<20} {:<20}",
            "INSTANCE", "PORT", "DATABASE", "CONTAINER", "CREATED", "LAST BACKUP"
        );
        if probed {
            header.push_str("  STATE");
        }
        println!("{}", header.style(self.ctx.styles.dim));

        for status in statuses {
            let record = &status.record;
            let mut line = format!(
                "{:<24} {:>5}  {:<20} {:<12}  {:<20} {:<20}",
                status.key.to_string(),
                record.port,
                record.database,
                short_id(&record.container_id),
                timestamp(record.created_at),
                record.last_backup_at.map_or_else(|| "never".to_string(), timestamp),
            );
            if probed {
                line.push_str("  ");
                line.push_str(&self.liveness(&status.liveness));
            }
            println!("{line}");
        }
    }

    fn liveness(&self, liveness: &Liveness) -> String {
        let styles = &self.ctx.styles;
        match liveness {
            Liveness::NotProbed => "-".to_string(),
            Liveness::Running => "running".style(styles.success).to_string(),
            Liveness::Stopped => "stopped".style(styles.warning).to_string(),
            Liveness::Unreachable(reason) => {
                format!("{} ({reason})", "unreachable".style(styles.error))
            }
        }
    }

    pub fn destroyed(&self, key: &InstanceKey, outcome: &DestroyOutcome) {
        if outcome.container_removed {
            self.ctx.success(&format!("Removed container {}", short_id(&outcome.record.container_id)));
        } else {
            self.ctx.info("Container was already gone");
        }
        if outcome.volume_removed {
            self.ctx.success(&format!("Removed volume {} and its data", outcome.record.volume));
        } else {
            self.ctx.info(&format!(
                "Kept volume {} (use --purge to delete data)",
                outcome.record.volume
            ));
        }
        if let Some(e) = &outcome.remote_state_error {
            self.ctx.warn(&format!("Remote state was not updated: {e}"));
        }
        self.ctx.success(&format!("{key} destroyed"));
    }

    pub fn backup(&self, key: &InstanceKey, outcome: &BackupOutcome) {
        self.ctx.success(&format!("Backed up {key}"));
        self.ctx.kv("Archive", &outcome.archive);
        self.ctx.kv("Taken", &timestamp(outcome.taken_at));
    }

    pub fn restored(&self, key: &InstanceKey, archive: &str) {
        self.ctx.success(&format!("Restored {key} from {archive}"));
    }

    pub fn synced(&self, key: &InstanceKey, outcome: &ReconcileOutcome) {
        if outcome.changed {
            self.ctx.success(&format!("{key}: {}", outcome.action));
        } else {
            self.ctx.info(&format!("{key}: state copies agree"));
        }
    }

    pub fn version(&self, version: &str) {
        println!("outpost {version}");
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates_long_ids() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_timestamp_is_minute_precision_utc() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T09:05:59Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        assert_eq!(timestamp(at), "2026-03-01 09:05 UTC");
    }
}
