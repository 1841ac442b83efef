//! Retention cleaner.
//!
//! Each step runs on its own; a failing step becomes a [`CleanupWarning`] and
//! the remaining steps still run. Purging a sync log keeps its change log rows
//! (their `sync_id` is nulled by the foreign key).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use precom_config::PrecomConfig;
use precom_core::enums::MasterKind;
use precom_db::PrecomDb;
use precom_db::error::DatabaseError;

use crate::backup::BackupManager;
use crate::error::{CleanupWarning, PipelineError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub purged_joints: u64,
    pub purged_masters: u64,
    pub purged_change_logs: u64,
    pub purged_sync_logs: u64,
    /// Backups newly flagged as past retention by this cleanup.
    pub expired_backups: u64,
    pub deleted_backups: u64,
    pub removed_files: u64,
    pub orphaned_aggregates: u64,
    pub warnings: Vec<CleanupWarning>,
}

impl CleanupReport {
    fn record(&mut self, step: &str, result: Result<u64, DatabaseError>) -> u64 {
        match result {
            Ok(n) => n,
            Err(e) => {
                self.warn(step, e.to_string());
                0
            }
        }
    }

    fn warn(&mut self, step: &str, message: String) {
        tracing::warn!(step, error = %message, "cleanup step failed");
        self.warnings.push(CleanupWarning {
            step: step.to_string(),
            message,
        });
    }
}

/// Soft-deleted rows of one table: all of them, and those a cleanup would purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletedRows {
    pub soft_deleted: u64,
    pub purgeable: u64,
}

/// What a cleanup with the same windows would remove, without removing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStatistics {
    pub grace_days: i64,
    pub audit_days: i64,
    /// Keyed by table name.
    pub deleted_records: BTreeMap<String, DeletedRows>,
    pub purgeable_change_logs: u64,
    pub purgeable_sync_logs: u64,
    /// Backups already flagged for deletion.
    pub unretained_backups: u64,
    pub orphaned_aggregates: u64,
}

pub struct RetentionCleaner<'a> {
    db: &'a PrecomDb,
    config: &'a PrecomConfig,
}

impl<'a> RetentionCleaner<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb, config: &'a PrecomConfig) -> Self {
        Self { db, config }
    }

    fn cutoffs(&self, grace_days: i64, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let audit_days = self.config.retention.audit_days_or(grace_days);
        (now - Duration::days(grace_days), now - Duration::days(audit_days))
    }

    /// Purge history older than its window. `grace_days` bounds soft-deleted rows;
    /// logs use `retention.audit_retention_days`, falling back to `grace_days`.
    /// The sync log `current_sync_id` is never purged.
    ///
    /// Never fails: problems are reported in [`CleanupReport::warnings`].
    pub async fn cleanup(&self, grace_days: i64, current_sync_id: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let (grace_cutoff, audit_cutoff) = self.cutoffs(grace_days, Utc::now());

        report.purged_joints = report.record(
            "joints",
            self.db.purge_deleted_joints(grace_cutoff).await,
        );
        for kind in MasterKind::ALL {
            let purged = report.record(
                kind.table_name(),
                self.db.purge_deleted_masters(kind, grace_cutoff).await,
            );
            report.purged_masters += purged;
        }
        report.purged_change_logs = report.record(
            "change_logs",
            self.db.purge_change_logs(audit_cutoff).await,
        );
        report.purged_sync_logs = report.record(
            "sync_logs",
            self.db.purge_sync_logs(audit_cutoff, current_sync_id).await,
        );
        self.remove_backups(&mut report).await;
        report.orphaned_aggregates = report.record(
            "aggregates",
            self.db.delete_orphaned_aggregates().await,
        );

        tracing::info!(
            joints = report.purged_joints,
            masters = report.purged_masters,
            change_logs = report.purged_change_logs,
            sync_logs = report.purged_sync_logs,
            backups = report.deleted_backups,
            warnings = report.warnings.len(),
            "cleanup finished"
        );
        report
    }

    /// Count what [`Self::cleanup`] with `grace_days` would remove.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Database` if a count query fails.
    pub async fn statistics(&self, grace_days: i64) -> Result<CleanupStatistics, PipelineError> {
        let (grace_cutoff, audit_cutoff) = self.cutoffs(grace_days, Utc::now());
        let mut deleted_records = BTreeMap::new();
        deleted_records.insert(
            "welding_joints".to_string(),
            DeletedRows {
                soft_deleted: self.db.count_deleted_joints(None).await?,
                purgeable: self.db.count_deleted_joints(Some(grace_cutoff)).await?,
            },
        );
        for kind in MasterKind::ALL {
            deleted_records.insert(
                kind.table_name().to_string(),
                DeletedRows {
                    soft_deleted: self.db.count_deleted_masters(kind, None).await?,
                    purgeable: self
                        .db
                        .count_deleted_masters(kind, Some(grace_cutoff))
                        .await?,
                },
            );
        }

        Ok(CleanupStatistics {
            grace_days,
            audit_days: self.config.retention.audit_days_or(grace_days),
            deleted_records,
            purgeable_change_logs: self.db.count_change_logs_before(audit_cutoff).await?,
            purgeable_sync_logs: self.db.count_sync_logs_before(audit_cutoff).await?,
            unretained_backups: self.db.list_unretained_backups().await?.len() as u64,
            orphaned_aggregates: self.db.count_orphaned_aggregates().await?,
        })
    }

    /// Flag expired backups, then delete files and rows of every backup no
    /// longer retained. A backup whose files cannot be removed keeps its row so
    /// the next cleanup retries it.
    async fn remove_backups(&self, report: &mut CleanupReport) {
        match BackupManager::new(self.db, &self.config.backup).mark_expired().await {
            Ok(marked) => report.expired_backups = marked,
            Err(e) => report.warn("backups", e.to_string()),
        }

        let backups = match self.db.list_unretained_backups().await {
            Ok(backups) => backups,
            Err(e) => {
                report.warn("backups", e.to_string());
                return;
            }
        };

        for backup in backups {
            let mut files_ok = true;
            for path in backup.manifest.values() {
                match std::fs::remove_file(path) {
                    Ok(()) => report.removed_files += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        report.warn("backups", format!("{path}: {e}"));
                        files_ok = false;
                    }
                }
            }
            if files_ok {
                let deleted = report.record("backups", self.db.delete_backup(&backup.id).await);
                report.deleted_backups += deleted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use precom_core::entities::{Backup, NewChange, SyncCounts};
    use precom_core::enums::{BackupStatus, BackupType, ChangeType, SyncStatus, SyncType, Trigger};
    use precom_core::lifecycle::Lifecycle;
    use precom_db::repos::sync_logs::SyncLogFinish;

    use crate::test_support::{joint, joint_data, test_db};

    fn config() -> PrecomConfig {
        PrecomConfig::default()
    }

    #[tokio::test]
    async fn purges_only_past_grace() {
        let db = test_db().await;
        let now = Utc::now();
        let mut old = joint(joint_data("DWG-1", "W1", "TP-1"), now);
        old.lifecycle = Lifecycle::SoftDeleted {
            deleted_at: now - Duration::days(120),
        };
        let mut recent = joint(joint_data("DWG-1", "W2", "TP-1"), now);
        recent.lifecycle = Lifecycle::SoftDeleted {
            deleted_at: now - Duration::days(10),
        };
        db.insert_joint(&old).await.unwrap();
        db.insert_joint(&recent).await.unwrap();

        let config = config();
        let report = RetentionCleaner::new(&db, &config).cleanup(90, None).await;

        assert_eq!(report.purged_joints, 1);
        assert!(report.warnings.is_empty());
        let left: Vec<_> = db
            .list_joints()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.weld_id)
            .collect();
        assert_eq!(left, vec!["DWG-1/W2".to_string()]);
    }

    #[tokio::test]
    async fn old_sync_log_goes_but_changes_stay() {
        let db = test_db().await;
        let start = Utc::now() - Duration::days(200);
        let log = db
            .create_sync_log(SyncType::WeldingImport, Trigger::Scheduled, start)
            .await
            .unwrap();
        db.finish_sync_log(
            &log.id,
            &SyncLogFinish {
                status: SyncStatus::Completed,
                counts: SyncCounts::default(),
                end_time: start,
                detail: serde_json::json!({}),
                error_message: None,
            },
        )
        .await
        .unwrap();
        let change = NewChange::new("welding_joints", "DWG-1/W1", ChangeType::Insert)
            .sync(Some(&log.id))
            .by("sync", "welding_import");
        db.append_change(&change, Utc::now()).await.unwrap();

        let config = config();
        let report = RetentionCleaner::new(&db, &config).cleanup(90, None).await;

        assert_eq!(report.purged_sync_logs, 1);
        assert_eq!(report.purged_change_logs, 0);
        let history = db
            .list_changes_for_record("welding_joints", "DWG-1/W1")
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sync_id, None);
    }

    #[tokio::test]
    async fn current_run_log_is_kept() {
        let db = test_db().await;
        let start = Utc::now() - Duration::days(200);
        let log = db
            .create_sync_log(SyncType::WeldingImport, Trigger::Manual, start)
            .await
            .unwrap();

        let mut config = config();
        config.retention.audit_retention_days = None;
        let report = RetentionCleaner::new(&db, &config)
            .cleanup(1, Some(&log.id))
            .await;
        assert_eq!(report.purged_sync_logs, 0);
        assert!(db.get_sync_log(&log.id).await.is_ok());
    }

    #[tokio::test]
    async fn unretained_backups_lose_files_and_rows() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.jsonl");
        std::fs::write(&present, "{}\n").unwrap();
        let missing = dir.path().join("missing.jsonl");

        let now = Utc::now();
        let backup = Backup {
            id: "bkp-00000001".into(),
            backup_type: BackupType::Full,
            trigger: Trigger::Scheduled,
            backup_time: now - Duration::days(60),
            backup_by: "scheduled".into(),
            description: None,
            table_counts: BTreeMap::new(),
            manifest: BTreeMap::from([
                ("systems".to_string(), present.display().to_string()),
                ("subsystems".to_string(), missing.display().to_string()),
            ]),
            size_bytes: 3,
            status: BackupStatus::Completed,
            error_message: None,
            retention_expiry: now - Duration::days(30),
            is_retained: false,
            created_at: now - Duration::days(60),
        };
        db.insert_backup(&backup).await.unwrap();

        let config = config();
        let report = RetentionCleaner::new(&db, &config).cleanup(90, None).await;

        assert_eq!(report.deleted_backups, 1);
        assert_eq!(report.removed_files, 1);
        assert!(report.warnings.is_empty());
        assert!(!present.exists());
        assert!(db.get_backup("bkp-00000001").await.is_err());
    }

    #[tokio::test]
    async fn expired_backups_are_flagged_and_removed_in_one_cleanup() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("systems.jsonl");
        std::fs::write(&file, "{}\n").unwrap();

        let now = Utc::now();
        let backup = Backup {
            id: "bkp-0000aa01".into(),
            backup_type: BackupType::Full,
            trigger: Trigger::Scheduled,
            backup_time: now - Duration::days(45),
            backup_by: "scheduled".into(),
            description: None,
            table_counts: BTreeMap::new(),
            manifest: BTreeMap::from([("systems".to_string(), file.display().to_string())]),
            size_bytes: 3,
            status: BackupStatus::Completed,
            error_message: None,
            retention_expiry: now - Duration::days(15),
            is_retained: true,
            created_at: now - Duration::days(45),
        };
        db.insert_backup(&backup).await.unwrap();

        let mut config = config();
        config.backup.min_keep = 0;
        let report = RetentionCleaner::new(&db, &config).cleanup(90, None).await;

        assert_eq!(report.expired_backups, 1);
        assert_eq!(report.deleted_backups, 1);
        assert!(!file.exists());
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn statistics_match_what_cleanup_removes() {
        let db = test_db().await;
        let now = Utc::now();
        let mut old = joint(joint_data("DWG-1", "W1", "TP-1"), now);
        old.lifecycle = Lifecycle::SoftDeleted {
            deleted_at: now - Duration::days(120),
        };
        let mut recent = joint(joint_data("DWG-1", "W2", "TP-1"), now);
        recent.lifecycle = Lifecycle::SoftDeleted {
            deleted_at: now - Duration::days(10),
        };
        db.insert_joint(&old).await.unwrap();
        db.insert_joint(&recent).await.unwrap();
        let change = NewChange::new("welding_joints", "DWG-1/W1", ChangeType::Insert)
            .by("sync", "welding_import");
        db.append_change(&change, now - Duration::days(200)).await.unwrap();

        let config = config();
        let cleaner = RetentionCleaner::new(&db, &config);
        let stats = cleaner.statistics(90).await.unwrap();

        assert_eq!(
            stats.deleted_records["welding_joints"],
            DeletedRows {
                soft_deleted: 2,
                purgeable: 1,
            }
        );
        assert_eq!(stats.deleted_records["systems"], DeletedRows::default());
        assert_eq!(stats.purgeable_change_logs, 1);
        assert_eq!(stats.audit_days, 90);
        assert_eq!(db.list_joints().await.unwrap().len(), 2);

        let report = cleaner.cleanup(90, None).await;
        assert_eq!(report.purged_joints, stats.deleted_records["welding_joints"].purgeable);
        assert_eq!(report.purged_change_logs, stats.purgeable_change_logs);
    }
}
