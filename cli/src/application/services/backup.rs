//! Database dumps and restores inside the running container.

use std::time::Duration;

use chrono::{DateTime, Utc};
use outpost_common::{InstanceKey, InstanceRecord};

use crate::application::ports::{ProgressReporter, RemoteShell, StateStore};
use crate::application::services::docker::detect_docker_access;
use crate::application::services::remote::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::classify::{BackupFailure, classify_backup_failure};
use crate::domain::commands;
use crate::domain::instance::backup_archive_path;
use crate::domain::{BackupError, CommandResult};

pub const BACKUP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    /// Archive path on the managed host, relative to the login directory.
    pub archive: String,
    pub taken_at: DateTime<Utc>,
}

/// Dump the instance's database to a gzip archive on the managed host and
/// record the time in both state copies.
///
/// # Errors
///
/// [`BackupError::NotFound`] for an unknown key, a classified dump failure,
/// or a transport or state failure.
pub async fn backup(
    shell: &impl RemoteShell,
    local: &impl StateStore,
    remote: &impl StateStore,
    key: &InstanceKey,
    reporter: &impl ProgressReporter,
) -> Result<BackupOutcome, BackupError> {
    let mut record = lookup(local, remote, key).await?;
    let docker = detect_docker_access(shell).await?;
    let taken_at = Utc::now();
    let archive = backup_archive_path(key, taken_at);

    reporter.step(&format!("dumping {} to {archive}...", record.database));
    let result = shell
        .execute(
            &docker.dump(
                &record.container_id,
                &record.admin_password,
                &record.database,
                &archive,
            ),
            BACKUP_TIMEOUT,
        )
        .await?;
    if !result.success() {
        return Err(classify(shell.host(), "mongodump", &record, &archive, &result));
    }

    record.last_backup_at = Some(taken_at);
    local.set(key, &record).await?;
    remote.set(key, &record).await?;
    tracing::info!(%key, %archive, "backup complete");
    reporter.success(&format!("backup written to {archive}"));
    Ok(BackupOutcome { archive, taken_at })
}

/// Restore `archive` (a path on the managed host) into the instance's
/// database, replacing the collections it contains.
///
/// # Errors
///
/// [`BackupError::ArchiveMissing`] when the file does not exist, otherwise
/// as for [`backup`].
pub async fn restore(
    shell: &impl RemoteShell,
    local: &impl StateStore,
    remote: &impl StateStore,
    key: &InstanceKey,
    archive: &str,
    reporter: &impl ProgressReporter,
) -> Result<(), BackupError> {
    let record = lookup(local, remote, key).await?;

    let exists = shell
        .execute(&commands::file_exists(archive), DEFAULT_COMMAND_TIMEOUT)
        .await?;
    if !exists.success() {
        return Err(BackupError::ArchiveMissing {
            host: shell.host().to_string(),
            archive: archive.to_string(),
        });
    }

    let docker = detect_docker_access(shell).await?;
    reporter.step(&format!("restoring {archive} into {}...", record.database));
    let result = shell
        .execute(
            &docker.restore(
                &record.container_id,
                &record.admin_password,
                &record.database,
                archive,
            ),
            BACKUP_TIMEOUT,
        )
        .await?;
    if !result.success() {
        return Err(classify(shell.host(), "mongorestore", &record, archive, &result));
    }
    tracing::info!(%key, %archive, "restore complete");
    reporter.success(&format!("restored {archive}"));
    Ok(())
}

async fn lookup(
    local: &impl StateStore,
    remote: &impl StateStore,
    key: &InstanceKey,
) -> Result<InstanceRecord, BackupError> {
    if let Some(record) = remote.get(key).await? {
        return Ok(record);
    }
    local.get(key).await?.ok_or_else(|| BackupError::NotFound {
        key: key.to_string(),
    })
}

fn classify(
    host: &str,
    operation: &'static str,
    record: &InstanceRecord,
    archive: &str,
    result: &CommandResult,
) -> BackupError {
    let host = host.to_string();
    match classify_backup_failure(result.diagnostic()) {
        BackupFailure::ContainerMissing => BackupError::ContainerMissing {
            host,
            container: record.container_id.clone(),
        },
        BackupFailure::DiskFull => BackupError::DiskFull { host },
        BackupFailure::PermissionDenied(detail) => BackupError::PermissionDenied { host, detail },
        BackupFailure::CorruptArchive(detail) => BackupError::CorruptArchive {
            host,
            archive: archive.to_string(),
            detail,
        },
        BackupFailure::Other(stderr) => BackupError::Failed {
            host,
            operation,
            exit_code: result.exit_code(),
            stderr,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{
        FakeHost, MemoryStateStore, RecordingReporter, key, record,
    };

    fn running_host() -> FakeHost {
        let host = FakeHost::default();
        host.add_container("outpost-app-dev", "abc123", true);
        host
    }

    #[tokio::test]
    async fn test_backup_writes_archive_and_stamps_both_records() {
        let host = running_host();
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let remote = MemoryStateStore::new("remote").with_record(&key(), record(27018, "abc123"));
        let out = backup(&host, &local, &remote, &key(), &RecordingReporter::default())
            .await
            .expect("backup");
        assert!(out.archive.starts_with(".outpost/backups/app-dev-"));
        assert!(host.with(|s| s.files.contains_key(&out.archive)));
        assert_eq!(
            local.record(&key()).expect("local").last_backup_at,
            Some(out.taken_at)
        );
        assert_eq!(
            remote.record(&key()).expect("remote").last_backup_at,
            Some(out.taken_at)
        );
        assert_eq!(host.timeout_of("mongodump"), Some(BACKUP_TIMEOUT));
    }

    #[tokio::test]
    async fn test_backup_of_missing_container_is_classified() {
        let host = FakeHost::default();
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let err = backup(
            &host,
            &local,
            &MemoryStateStore::new("remote"),
            &key(),
            &RecordingReporter::default(),
        )
        .await
        .expect_err("no container");
        assert!(matches!(err, BackupError::ContainerMissing { .. }));
        assert!(local.record(&key()).expect("local").last_backup_at.is_none());
    }

    #[tokio::test]
    async fn test_backup_disk_full_is_classified() {
        let host = running_host();
        host.with(|s| s.dump_stderr = Some("write error: No space left on device".into()));
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let err = backup(
            &host,
            &local,
            &MemoryStateStore::new("remote"),
            &key(),
            &RecordingReporter::default(),
        )
        .await
        .expect_err("disk full");
        assert!(matches!(err, BackupError::DiskFull { .. }));
    }

    #[tokio::test]
    async fn test_restore_requires_existing_archive() {
        let host = running_host();
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let err = restore(
            &host,
            &local,
            &MemoryStateStore::new("remote"),
            &key(),
            ".outpost/backups/missing.archive.gz",
            &RecordingReporter::default(),
        )
        .await
        .expect_err("missing");
        assert!(matches!(err, BackupError::ArchiveMissing { .. }));
        assert!(!host.ran("mongorestore"));
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let host = running_host();
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let remote = MemoryStateStore::new("remote");
        let reporter = RecordingReporter::default();
        let out = backup(&host, &local, &remote, &key(), &reporter)
            .await
            .expect("backup");
        restore(&host, &local, &remote, &key(), &out.archive, &reporter)
            .await
            .expect("restore");
        assert!(host.ran("mongorestore --archive --gzip --drop"));
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_classified() {
        let host = running_host();
        host.with(|s| {
            s.files.insert("a.gz".into(), "junk".into());
            s.restore_stderr = Some("Failed: gzip: invalid header".into());
        });
        let local = MemoryStateStore::new("local").with_record(&key(), record(27018, "abc123"));
        let err = restore(
            &host,
            &local,
            &MemoryStateStore::new("remote"),
            &key(),
            "a.gz",
            &RecordingReporter::default(),
        )
        .await
        .expect_err("corrupt");
        assert!(matches!(err, BackupError::CorruptArchive { .. }));
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let err = backup(
            &running_host(),
            &MemoryStateStore::new("local"),
            &MemoryStateStore::new("remote"),
            &key(),
            &RecordingReporter::default(),
        )
        .await
        .expect_err("unknown");
        assert!(matches!(err, BackupError::NotFound { .. }));
    }
}
