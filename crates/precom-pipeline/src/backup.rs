//! Backup manager: JSON Lines snapshots of joint and master tables.
//!
//! Snapshot files land at
//! `{backup.dir}/{trigger}/backup_{id}_{table}_{yyyymmdd_HHMMSS}.jsonl`, one
//! serialized row per line. The `data_backups` row is inserted `running` before
//! any file is written and moves to `completed` or `failed` exactly once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use precom_config::BackupConfig;
use precom_core::entities::{Backup, MasterRecord, NewChange, WeldingJoint};
use precom_core::enums::{BackupStatus, BackupType, ChangeType, SnapshotTable, Trigger};
use precom_core::lifecycle::Lifecycle;
use precom_core::ids::PREFIX_BACKUP;
use precom_db::PrecomDb;
use precom_db::error::DatabaseError;

use crate::error::PipelineError;
use crate::in_transaction;

const RESTORE_ACTOR: &str = "restore";
const RESTORE_SOURCE: &str = "backup_restore";
const RECORD_RESTORE_SOURCE: &str = "record_restore";

/// Tables restored by one [`BackupManager::restore_backup`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub backup_id: String,
    /// Rows written per table.
    pub tables: BTreeMap<String, u64>,
}

/// Row counts of one table, now and in a backup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableComparison {
    pub backup: u64,
    /// All rows now, soft-deleted included, as a snapshot counts them.
    pub current: u64,
    pub current_active: u64,
    pub difference: i64,
}

/// Preview of what restoring a backup would change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupComparison {
    pub backup_id: String,
    pub backup_time: DateTime<Utc>,
    pub tables: BTreeMap<String, TableComparison>,
}

/// One soft-deleted row brought back by [`BackupManager::restore_record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRestore {
    pub table: SnapshotTable,
    pub record_id: String,
    pub deleted_at: DateTime<Utc>,
}

pub struct BackupManager<'a> {
    db: &'a PrecomDb,
    config: &'a BackupConfig,
}

struct Snapshot {
    table_counts: BTreeMap<String, u64>,
    manifest: BTreeMap<String, String>,
    size_bytes: u64,
}

fn io_failure(path: &Path, err: &std::io::Error) -> PipelineError {
    PipelineError::Backup(format!("{}: {err}", path.display()))
}

impl<'a> BackupManager<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb, config: &'a BackupConfig) -> Self {
        Self { db, config }
    }

    /// Snapshot `tables` (all snapshot tables when empty).
    ///
    /// On success the backup is `completed` and expired older backups are
    /// flagged. On failure the row is marked `failed`, partial files are removed
    /// and `PipelineError::Backup` is returned.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Backup` for any I/O or database failure.
    pub async fn create_backup(
        &self,
        trigger: Trigger,
        tables: &[SnapshotTable],
        description: Option<&str>,
    ) -> Result<Backup, PipelineError> {
        let now = Utc::now();
        let backup_failure = |e: PipelineError| match e {
            PipelineError::Backup(_) => e,
            other => PipelineError::Backup(other.to_string()),
        };

        let id = self
            .db
            .generate_id(PREFIX_BACKUP)
            .await
            .map_err(|e| backup_failure(e.into()))?;
        let backup = Backup {
            id: id.clone(),
            backup_type: BackupType::for_trigger(trigger),
            trigger,
            backup_time: now,
            backup_by: trigger.as_str().to_string(),
            description: description.map(str::to_string),
            table_counts: BTreeMap::new(),
            manifest: BTreeMap::new(),
            size_bytes: 0,
            status: BackupStatus::Running,
            error_message: None,
            retention_expiry: now + Duration::days(self.config.retention_days),
            is_retained: true,
            created_at: now,
        };
        self.db
            .insert_backup(&backup)
            .await
            .map_err(|e| backup_failure(e.into()))?;

        let tables = if tables.is_empty() {
            SnapshotTable::ALL.as_slice()
        } else {
            tables
        };
        let mut written = Vec::new();
        let result = self.write_snapshot(&backup, tables, &mut written).await;
        let result = match result {
            Ok(snapshot) => self
                .db
                .complete_backup(
                    &id,
                    &snapshot.table_counts,
                    &snapshot.manifest,
                    snapshot.size_bytes,
                )
                .await
                .map_err(PipelineError::from),
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            let err = backup_failure(err);
            tracing::warn!(backup_id = %id, error = %err, "backup failed");
            for path in &written {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "cannot remove partial snapshot");
                }
            }
            if let Err(e) = self.db.fail_backup(&id, &err.to_string()).await {
                tracing::warn!(backup_id = %id, error = %e, "cannot mark backup failed");
            }
            return Err(err);
        }

        let completed = self
            .db
            .get_backup(&id)
            .await
            .map_err(|e| backup_failure(e.into()))?;
        tracing::info!(
            backup_id = %id,
            trigger = %trigger,
            size_bytes = completed.size_bytes,
            "backup completed"
        );

        if let Err(e) = self.mark_expired().await {
            tracing::warn!(error = %e, "cannot flag expired backups");
        }
        Ok(completed)
    }

    async fn write_snapshot(
        &self,
        backup: &Backup,
        tables: &[SnapshotTable],
        written: &mut Vec<PathBuf>,
    ) -> Result<Snapshot, PipelineError> {
        let dir = Path::new(&self.config.dir).join(backup.trigger.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| io_failure(&dir, &e))?;
        let stamp = backup.backup_time.format("%Y%m%d_%H%M%S");

        let mut snapshot = Snapshot {
            table_counts: BTreeMap::new(),
            manifest: BTreeMap::new(),
            size_bytes: 0,
        };
        for table in tables {
            let path = dir.join(format!("backup_{}_{}_{stamp}.jsonl", backup.id, table.as_str()));
            let count = match table.master_kind() {
                Some(kind) => {
                    let rows = self.db.list_masters(kind).await?;
                    written.push(path.clone());
                    serde_jsonlines::write_json_lines(&path, &rows)
                        .map_err(|e| io_failure(&path, &e))?;
                    rows.len()
                }
                None => {
                    let rows = self.db.list_joints().await?;
                    written.push(path.clone());
                    serde_jsonlines::write_json_lines(&path, &rows)
                        .map_err(|e| io_failure(&path, &e))?;
                    rows.len()
                }
            };
            let size = std::fs::metadata(&path)
                .map_err(|e| io_failure(&path, &e))?
                .len();

            snapshot
                .table_counts
                .insert(table.as_str().to_string(), count as u64);
            snapshot
                .manifest
                .insert(table.as_str().to_string(), path.display().to_string());
            snapshot.size_bytes += size;
            tracing::debug!(table = table.as_str(), rows = count, path = %path.display(), "table snapshot written");
        }
        Ok(snapshot)
    }

    /// Flag completed backups past their retention expiry, sparing the
    /// `backup.min_keep` newest. Returns the number flagged.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Database` if the update fails.
    pub async fn mark_expired(&self) -> Result<u64, PipelineError> {
        let marked = self
            .db
            .mark_expired_backups(Utc::now(), self.config.min_keep)
            .await?;
        if marked > 0 {
            tracing::info!(marked, "backups flagged for deletion");
        }
        Ok(marked)
    }

    /// # Errors
    ///
    /// Returns `PipelineError::Database` if the query fails.
    pub async fn list_backups(&self, limit: u32) -> Result<Vec<Backup>, PipelineError> {
        Ok(self.db.list_backups(limit).await?)
    }

    /// # Errors
    ///
    /// Returns `PipelineError::Database` if no backup has this id.
    pub async fn get_backup(&self, id: &str) -> Result<Backup, PipelineError> {
        Ok(self.db.get_backup(id).await?)
    }

    /// Replace the content of `tables` (every table in the manifest when empty)
    /// with the snapshot of backup `id`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Restore` when the backup is not completed, a table
    /// is missing from its manifest, or a snapshot file cannot be read.
    pub async fn restore_backup(
        &self,
        id: &str,
        tables: &[SnapshotTable],
    ) -> Result<RestoreReport, PipelineError> {
        let backup = self.db.get_backup(id).await?;
        if backup.status != BackupStatus::Completed {
            return Err(PipelineError::Restore(format!(
                "backup {id} is {}, only completed backups can be restored",
                backup.status
            )));
        }

        let tables: Vec<SnapshotTable> = if tables.is_empty() {
            backup
                .manifest
                .keys()
                .filter_map(|name| SnapshotTable::from_name(name))
                .collect()
        } else {
            tables.to_vec()
        };

        let mut loaded = Vec::new();
        for table in tables {
            let path = backup.manifest.get(table.as_str()).ok_or_else(|| {
                PipelineError::Restore(format!("backup {id} has no snapshot of {table}"))
            })?;
            loaded.push((table, load_snapshot(table, Path::new(path))?));
        }

        let report = in_transaction(self.db, async {
            let mut report = RestoreReport {
                backup_id: id.to_string(),
                tables: BTreeMap::new(),
            };
            let now = Utc::now();
            for (table, rows) in &loaded {
                let count = match rows {
                    SnapshotRows::Joints(joints) => {
                        self.db.replace_joints(joints).await?;
                        joints.len()
                    }
                    SnapshotRows::Masters(records) => {
                        let kind = table.master_kind().ok_or_else(|| {
                            PipelineError::Restore(format!("{table} is not a master table"))
                        })?;
                        self.db.replace_masters(kind, records).await?;
                        records.len()
                    }
                };
                let change = NewChange::new(table.as_str(), id, ChangeType::Restore)
                    .field("rows", None, Some(count.to_string()))
                    .by(RESTORE_ACTOR, RESTORE_SOURCE);
                self.db.append_change(&change, now).await?;
                report.tables.insert(table.as_str().to_string(), count as u64);
            }
            Ok::<_, PipelineError>(report)
        })
        .await?;

        tracing::info!(backup_id = id, tables = ?report.tables, "backup restored");
        Ok(report)
    }

    /// Restore from the newest completed backup taken at or before `at`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Restore` when no such backup exists, or any
    /// error of [`Self::restore_backup`].
    pub async fn restore_to_time(
        &self,
        at: DateTime<Utc>,
        tables: &[SnapshotTable],
    ) -> Result<RestoreReport, PipelineError> {
        let backup = self.backup_at(at).await?;
        tracing::info!(backup_id = %backup.id, backup_time = %backup.backup_time, at = %at, "restoring closest backup");
        self.restore_backup(&backup.id, tables).await
    }

    /// Newest completed backup taken at or before `at`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Restore` when there is none.
    pub async fn backup_at(&self, at: DateTime<Utc>) -> Result<Backup, PipelineError> {
        self.db
            .latest_completed_backup_at(at)
            .await?
            .ok_or_else(|| PipelineError::Restore(format!("no completed backup at or before {at}")))
    }

    /// Row counts now against the counts recorded in backup `id`, per
    /// backed-up table.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Database` if the backup does not exist or a count
    /// fails.
    pub async fn compare_with_backup(&self, id: &str) -> Result<BackupComparison, PipelineError> {
        let backup = self.db.get_backup(id).await?;
        let mut tables = BTreeMap::new();
        for (name, &backup_count) in &backup.table_counts {
            let Some(table) = SnapshotTable::from_name(name) else {
                continue;
            };
            let current = self.db.count_rows(table).await?;
            let current_active = self.db.count_active_rows(table).await?;
            let difference = i64::try_from(current).unwrap_or(i64::MAX)
                - i64::try_from(backup_count).unwrap_or(i64::MAX);
            tables.insert(
                name.clone(),
                TableComparison {
                    backup: backup_count,
                    current,
                    current_active,
                    difference,
                },
            );
        }
        Ok(BackupComparison {
            backup_id: backup.id,
            backup_time: backup.backup_time,
            tables,
        })
    }

    /// Bring back one soft-deleted row of `table` and hand it to operators
    /// (`is_manually_modified`), so the next sync does not retire it again.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Restore` when the row is active or no longer
    /// exists.
    pub async fn restore_record(
        &self,
        table: SnapshotTable,
        record_id: &str,
    ) -> Result<RecordRestore, PipelineError> {
        let not_found = |e: DatabaseError| match e {
            DatabaseError::NoResult => {
                PipelineError::Restore(format!("{table} has no record '{record_id}'"))
            }
            other => other.into(),
        };
        let now = Utc::now();

        let deleted_at = in_transaction(self.db, async {
            let deleted_at = match table.master_kind() {
                Some(kind) => {
                    let mut record = self.db.get_master(kind, record_id).await.map_err(not_found)?;
                    let (deleted_at, restored) = undelete(table, record_id, record.lifecycle)?;
                    record.lifecycle = restored;
                    record.is_manually_modified = true;
                    record.needs_review = false;
                    record.last_sync_time = Some(now);
                    record.updated_at = now;
                    self.db.update_master(&record).await?;
                    deleted_at
                }
                None => {
                    let joint = self.db.get_joint(record_id).await.map_err(not_found)?;
                    let (deleted_at, restored) = undelete(table, record_id, joint.lifecycle)?;
                    self.db.set_joint_lifecycle(record_id, restored, now).await?;
                    self.db.set_joint_manual(record_id, true, now).await?;
                    deleted_at
                }
            };
            let change = NewChange::new(table.as_str(), record_id, ChangeType::Restore)
                .field("is_deleted", Some("true".into()), Some("false".into()))
                .by(RESTORE_ACTOR, RECORD_RESTORE_SOURCE);
            self.db.append_change(&change, now).await?;
            Ok::<_, PipelineError>(deleted_at)
        })
        .await?;

        tracing::info!(table = table.as_str(), record_id, "soft-deleted record restored");
        Ok(RecordRestore {
            table,
            record_id: record_id.to_string(),
            deleted_at,
        })
    }
}

fn undelete(
    table: SnapshotTable,
    record_id: &str,
    lifecycle: Lifecycle,
) -> Result<(DateTime<Utc>, Lifecycle), PipelineError> {
    match (lifecycle.deleted_at(), lifecycle.restore()) {
        (Some(deleted_at), Some(restored)) => Ok((deleted_at, restored)),
        _ => Err(PipelineError::Restore(format!(
            "{table} record '{record_id}' is not soft-deleted"
        ))),
    }
}

enum SnapshotRows {
    Joints(Vec<WeldingJoint>),
    Masters(Vec<MasterRecord>),
}

fn load_snapshot(table: SnapshotTable, path: &Path) -> Result<SnapshotRows, PipelineError> {
    let restore_err = |e: std::io::Error| PipelineError::Restore(format!("{}: {e}", path.display()));
    let rows = if table.master_kind().is_some() {
        SnapshotRows::Masters(
            serde_jsonlines::json_lines(path)
                .map_err(restore_err)?
                .collect::<Result<Vec<MasterRecord>, _>>()
                .map_err(restore_err)?,
        )
    } else {
        SnapshotRows::Joints(
            serde_jsonlines::json_lines(path)
                .map_err(restore_err)?
                .collect::<Result<Vec<WeldingJoint>, _>>()
                .map_err(restore_err)?,
        )
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use precom_core::entities::MasterAttributes;
    use precom_core::enums::{DataSource, MasterKind};

    use crate::test_support::{joint, joint_data, test_db, ts};

    fn config(dir: &Path) -> BackupConfig {
        BackupConfig {
            dir: dir.display().to_string(),
            ..BackupConfig::default()
        }
    }

    #[tokio::test]
    async fn snapshot_writes_one_file_per_table() {
        let db = test_db().await;
        db.insert_joint(&joint(joint_data("DWG-1", "W1", "TP-1"), ts(1)))
            .await
            .unwrap();
        db.insert_joint(&joint(joint_data("DWG-1", "W2", "TP-1"), ts(1)))
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);

        let backup = manager
            .create_backup(Trigger::PreImport, &[], Some("before import"))
            .await
            .unwrap();

        assert_eq!(backup.status, BackupStatus::Completed);
        assert_eq!(backup.backup_type, BackupType::Full);
        assert_eq!(backup.table_counts["welding_joints"], 2);
        assert_eq!(backup.table_counts["systems"], 0);
        assert_eq!(backup.manifest.len(), 4);
        assert!(backup.size_bytes > 0);

        let joints_file = Path::new(&backup.manifest["welding_joints"]);
        assert!(joints_file.starts_with(dir.path().join("pre_import")));
        let name = joints_file.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(&format!("backup_{}_welding_joints_", backup.id)));
        assert!(name.ends_with(".jsonl"));
    }

    #[tokio::test]
    async fn unwritable_dir_fails_backup() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let config = config(&blocker);
        let manager = BackupManager::new(&db, &config);

        let err = manager
            .create_backup(Trigger::Manual, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Backup(_)));

        let backups = manager.list_backups(10).await.unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].status, BackupStatus::Failed);
        assert!(backups[0].error_message.is_some());
    }

    #[tokio::test]
    async fn restore_replaces_table_content() {
        let db = test_db().await;
        db.insert_joint(&joint(joint_data("DWG-1", "W1", "TP-1"), ts(1)))
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);
        let backup = manager
            .create_backup(Trigger::Manual, &[SnapshotTable::WeldingJoints], None)
            .await
            .unwrap();

        db.insert_joint(&joint(joint_data("DWG-1", "W2", "TP-1"), ts(2)))
            .await
            .unwrap();
        let report = manager.restore_backup(&backup.id, &[]).await.unwrap();

        assert_eq!(report.tables["welding_joints"], 1);
        let joints = db.list_joints().await.unwrap();
        assert_eq!(joints, vec![joint(joint_data("DWG-1", "W1", "TP-1"), ts(1))]);

        let history = db
            .list_changes_for_record("welding_joints", &backup.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, ChangeType::Restore);
        assert_eq!(history[0].actor, "restore");
    }

    #[tokio::test]
    async fn restore_rejects_missing_table() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);
        let backup = manager
            .create_backup(Trigger::Manual, &[SnapshotTable::Systems], None)
            .await
            .unwrap();

        let err = manager
            .restore_backup(&backup.id, &[MasterKind::TestPackage.snapshot_table()])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Restore(_)));
    }

    #[tokio::test]
    async fn compare_counts_rows_now_against_backup() {
        let db = test_db().await;
        for weld in ["W1", "W2"] {
            db.insert_joint(&joint(joint_data("DWG-1", weld, "TP-1"), ts(1)))
                .await
                .unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);
        let backup = manager.create_backup(Trigger::Manual, &[], None).await.unwrap();

        db.insert_joint(&joint(joint_data("DWG-1", "W3", "TP-1"), ts(2)))
            .await
            .unwrap();
        db.set_joint_lifecycle("DWG-1/W1", Lifecycle::SoftDeleted { deleted_at: ts(3) }, ts(3))
            .await
            .unwrap();

        let comparison = manager.compare_with_backup(&backup.id).await.unwrap();
        assert_eq!(comparison.backup_id, backup.id);
        assert_eq!(comparison.tables.len(), 4);
        assert_eq!(
            comparison.tables["welding_joints"],
            TableComparison {
                backup: 2,
                current: 3,
                current_active: 2,
                difference: 1,
            }
        );
        assert_eq!(comparison.tables["systems"], TableComparison::default());
    }

    #[tokio::test]
    async fn restore_to_time_uses_latest_backup_before_it() {
        let db = test_db().await;
        db.insert_joint(&joint(joint_data("DWG-1", "W1", "TP-1"), ts(1)))
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);
        let backup = manager
            .create_backup(Trigger::Manual, &[SnapshotTable::WeldingJoints], None)
            .await
            .unwrap();
        db.insert_joint(&joint(joint_data("DWG-1", "W2", "TP-1"), ts(2)))
            .await
            .unwrap();

        let err = manager.restore_to_time(ts(1), &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Restore(_)));

        let report = manager.restore_to_time(Utc::now(), &[]).await.unwrap();
        assert_eq!(report.backup_id, backup.id);
        assert_eq!(db.list_joints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_restore_revives_soft_deleted_joint() {
        let db = test_db().await;
        let mut gone = joint(joint_data("DWG-1", "W1", "TP-1"), ts(1));
        gone.lifecycle = Lifecycle::SoftDeleted { deleted_at: ts(4) };
        db.insert_joint(&gone).await.unwrap();
        db.insert_joint(&joint(joint_data("DWG-1", "W2", "TP-1"), ts(1)))
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = BackupManager::new(&db, &config);

        let restored = manager
            .restore_record(SnapshotTable::WeldingJoints, "DWG-1/W1")
            .await
            .unwrap();
        assert_eq!(restored.deleted_at, ts(4));
        let after = db.get_joint("DWG-1/W1").await.unwrap();
        assert!(after.lifecycle.is_active());
        assert!(after.is_manually_modified);

        let history = db
            .list_changes_for_record("welding_joints", "DWG-1/W1")
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, ChangeType::Restore);
        assert_eq!(history[0].source, "record_restore");

        for id in ["DWG-1/W2", "DWG-1/W9"] {
            let err = manager
                .restore_record(SnapshotTable::WeldingJoints, id)
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::Restore(_)), "{id}");
        }
    }

    #[tokio::test]
    async fn record_restore_revives_master_row() {
        let db = test_db().await;
        let record = MasterRecord {
            kind: MasterKind::TestPackage,
            code: "TP-7".into(),
            attributes: MasterAttributes::default(),
            data_source: DataSource::Derived,
            is_manually_modified: false,
            needs_review: false,
            lifecycle: Lifecycle::SoftDeleted { deleted_at: ts(5) },
            last_sync_time: Some(ts(5)),
            created_at: ts(1),
            updated_at: ts(5),
        };
        db.insert_master(&record).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        BackupManager::new(&db, &config)
            .restore_record(SnapshotTable::TestPackages, "TP-7")
            .await
            .unwrap();
        let after = db.get_master(MasterKind::TestPackage, "TP-7").await.unwrap();
        assert!(after.lifecycle.is_active());
        assert!(after.is_manually_modified);
    }
}
