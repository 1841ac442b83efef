//! Record importer: reconciles spreadsheet rows into `welding_joints`.
//!
//! Rows are matched on the natural key (drawing number, weld joint). Joints that
//! disappear from the source are soft-deleted, but only within the
//! (system, subsystem) pairs the source covers, so a partial export never
//! retires joints of systems it does not mention. A row rejected as malformed
//! still names its joint, and that joint is left as it is.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use precom_config::SourceConfig;
use precom_core::entities::{JointData, NewChange, SyncCounts, WeldingJoint};
use precom_core::enums::{ChangeType, SnapshotTable};
use precom_core::lifecycle::Lifecycle;
use precom_db::PrecomDb;

use crate::error::{DateWarning, PipelineError, RowError};
use crate::source::{SourceRecord, read_source};
use crate::{SYNC_ACTOR, in_transaction};

const IMPORT_SOURCE: &str = "welding_import";
const TABLE: &str = SnapshotTable::WeldingJoints.as_str();

/// Outcome of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub counts: SyncCounts,
    /// Matched rows with no field differences.
    pub unchanged: u64,
    /// Joints that were soft-deleted and came back.
    pub restored: u64,
    pub files: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub date_warnings: Vec<DateWarning>,
}

pub struct RecordImporter<'a> {
    db: &'a PrecomDb,
    config: &'a SourceConfig,
}

/// Keep the last row per natural key. Earlier rows become `duplicate key` errors.
fn dedupe(records: Vec<SourceRecord>, row_errors: &mut Vec<RowError>) -> Vec<SourceRecord> {
    let mut last_index = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        last_index.insert(record.data.key(), idx);
    }

    let mut kept = Vec::with_capacity(last_index.len());
    for (idx, record) in records.into_iter().enumerate() {
        let key = record.data.key();
        if last_index.get(&key) == Some(&idx) {
            kept.push(record);
        } else {
            tracing::warn!(
                file = %record.file,
                row = record.row,
                key = %key,
                "duplicate key in source, later row wins"
            );
            row_errors.push(RowError {
                file: record.file,
                row: record.row,
                key: Some(key.weld_id()),
                reason: "duplicate key".to_string(),
            });
        }
    }
    kept
}

impl<'a> RecordImporter<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb, config: &'a SourceConfig) -> Self {
        Self { db, config }
    }

    /// Import every export under `path`, tagging change log rows with `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ImportSystemic` when the source cannot be read or
    /// the database fails. The reconciliation is rolled back in that case.
    pub async fn import_records(
        &self,
        path: &Path,
        sync_id: Option<&str>,
    ) -> Result<ImportReport, PipelineError> {
        let batch = read_source(path, self.config)
            .map_err(|e| PipelineError::ImportSystemic(e.to_string()))?;

        let mut report = ImportReport {
            files: batch.files,
            row_errors: batch.row_errors,
            date_warnings: batch.date_warnings,
            ..ImportReport::default()
        };
        let records = dedupe(batch.records, &mut report.row_errors);
        let rejected: HashSet<String> = report
            .row_errors
            .iter()
            .filter_map(|e| e.key.clone())
            .collect();

        let now = Utc::now();
        let reconcile = self.reconcile(&records, &rejected, sync_id, now, &mut report);
        in_transaction(self.db, reconcile)
            .await
            .map_err(|e| match e {
                PipelineError::Database(db_err) => PipelineError::ImportSystemic(db_err.to_string()),
                other => other,
            })?;

        report.counts.skipped += report.row_errors.len() as u64;
        for warning in &report.date_warnings {
            tracing::warn!(file = %warning.file, row = warning.row, value = %warning.value, "invalid weld date");
        }
        tracing::info!(
            added = report.counts.added,
            updated = report.counts.updated,
            deleted = report.counts.deleted,
            skipped = report.counts.skipped,
            unchanged = report.unchanged,
            "import finished"
        );
        Ok(report)
    }

    async fn reconcile(
        &self,
        records: &[SourceRecord],
        rejected: &HashSet<String>,
        sync_id: Option<&str>,
        now: DateTime<Utc>,
        report: &mut ImportReport,
    ) -> Result<(), PipelineError> {
        let existing: HashMap<String, WeldingJoint> = self
            .db
            .list_joints()
            .await?
            .into_iter()
            .map(|j| (j.weld_id.clone(), j))
            .collect();

        let scope: BTreeSet<(&str, &str)> = records
            .iter()
            .map(|r| (r.data.system_code.as_str(), r.data.subsystem_code.as_str()))
            .collect();
        let mut seen = HashSet::new();

        for record in records {
            let weld_id = record.data.key().weld_id();
            match existing.get(&weld_id) {
                None => {
                    self.insert(&weld_id, &record.data, sync_id, now).await?;
                    report.counts.added += 1;
                }
                Some(stored) if stored.is_manually_modified => {
                    self.db.touch_joint_sync(&weld_id, now).await?;
                    report.counts.skipped += 1;
                    tracing::debug!(weld_id = %weld_id, "manually modified joint kept");
                }
                Some(stored) => {
                    let outcome = self.apply(stored, &record.data, sync_id, now).await?;
                    match outcome {
                        Applied::Unchanged => report.unchanged += 1,
                        Applied::Updated => report.counts.updated += 1,
                        Applied::Restored => {
                            report.counts.updated += 1;
                            report.restored += 1;
                        }
                    }
                }
            }
            seen.insert(weld_id);
        }

        for stored in existing.values() {
            let in_scope = scope.contains(&(
                stored.data.system_code.as_str(),
                stored.data.subsystem_code.as_str(),
            ));
            if !in_scope || seen.contains(&stored.weld_id) {
                continue;
            }
            if rejected.contains(&stored.weld_id) {
                tracing::debug!(weld_id = %stored.weld_id, "joint kept, its source row was rejected");
                continue;
            }
            let Some(deleted) = stored.lifecycle.soft_delete(now) else {
                continue;
            };
            self.db
                .set_joint_lifecycle(&stored.weld_id, deleted, now)
                .await?;
            let change = NewChange::new(TABLE, &stored.weld_id, ChangeType::SoftDelete)
                .sync(sync_id)
                .field("is_deleted", Some("false".into()), Some("true".into()))
                .by(SYNC_ACTOR, IMPORT_SOURCE);
            self.db.append_change(&change, now).await?;
            report.counts.deleted += 1;
        }
        Ok(())
    }

    async fn insert(
        &self,
        weld_id: &str,
        data: &JointData,
        sync_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let joint = WeldingJoint {
            weld_id: weld_id.to_string(),
            data: data.clone(),
            is_manually_modified: false,
            lifecycle: Lifecycle::Active,
            last_sync_time: Some(now),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_joint(&joint).await?;
        let change = NewChange::new(TABLE, weld_id, ChangeType::Insert)
            .sync(sync_id)
            .by(SYNC_ACTOR, IMPORT_SOURCE);
        self.db.append_change(&change, now).await?;
        Ok(())
    }

    async fn apply(
        &self,
        stored: &WeldingJoint,
        incoming: &JointData,
        sync_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Applied, PipelineError> {
        let changes = stored.data.diff(incoming);
        let restored = stored.lifecycle.restore();

        if changes.is_empty() && restored.is_none() {
            self.db.touch_joint_sync(&stored.weld_id, now).await?;
            return Ok(Applied::Unchanged);
        }

        let lifecycle = restored.unwrap_or(stored.lifecycle);
        self.db
            .update_joint_data(&stored.weld_id, incoming, lifecycle, now)
            .await?;

        if restored.is_some() {
            let change = NewChange::new(TABLE, &stored.weld_id, ChangeType::Restore)
                .sync(sync_id)
                .field("is_deleted", Some("true".into()), Some("false".into()))
                .by(SYNC_ACTOR, IMPORT_SOURCE);
            self.db.append_change(&change, now).await?;
        }
        for change in changes {
            let entry = NewChange::new(TABLE, &stored.weld_id, ChangeType::Update)
                .sync(sync_id)
                .field(change.field, change.old_value, change.new_value)
                .by(SYNC_ACTOR, IMPORT_SOURCE);
            self.db.append_change(&entry, now).await?;
        }

        Ok(if restored.is_some() {
            Applied::Restored
        } else {
            Applied::Updated
        })
    }
}

enum Applied {
    Unchanged,
    Updated,
    Restored,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use precom_core::ndt::{NdtMethod, NdtResult};

    use crate::test_support::{test_db, write_export};

    async fn import(db: &PrecomDb, dir: &Path) -> ImportReport {
        let config = SourceConfig::default();
        RecordImporter::new(db, &config)
            .import_records(dir, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reconciles_insert_update_delete() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_export(
            dir.path(),
            "1",
            &[
                "DWG-1,A,S1,S1-A,TP-1,,2,,",
                "DWG-1,B,S1,S1-A,TP-1,,2,,",
                "DWG-1,C,S1,S1-A,TP-1,,2,,",
            ],
        );
        let first = import(&db, dir.path()).await;
        assert_eq!(first.counts.added, 3);

        std::fs::remove_file(file).unwrap();
        write_export(
            dir.path(),
            "2",
            &[
                "DWG-1,A,S1,S1-A,TP-1,,4,ACC,",
                "DWG-1,C,S1,S1-A,TP-1,,2,,",
                "DWG-1,D,S1,S1-A,TP-1,,2,,",
            ],
        );
        let second = import(&db, dir.path()).await;
        assert_eq!(
            second.counts,
            SyncCounts {
                added: 1,
                updated: 1,
                deleted: 1,
                skipped: 0,
            }
        );
        assert_eq!(second.unchanged, 1);

        let b = db.get_joint("DWG-1/B").await.unwrap();
        assert!(!b.lifecycle.is_active());
        let a = db.get_joint("DWG-1/A").await.unwrap();
        assert_eq!(a.data.size, Some(4.0));
        assert_eq!(a.data.results.get(NdtMethod::Vt), Some(NdtResult::Accepted));

        let history = db.list_changes_for_record(TABLE, "DWG-1/A").await.unwrap();
        let fields: Vec<_> = history
            .iter()
            .filter_map(|c| c.field_name.as_deref())
            .collect();
        assert_eq!(fields, vec!["size", "vt_result"]);
    }

    #[tokio::test]
    async fn manual_rows_are_skipped_but_touched() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        write_export(dir.path(), "1", &["DWG-1,A,S1,S1-A,TP-1,,2,,"]);
        import(&db, dir.path()).await;
        db.conn()
            .execute(
                "UPDATE welding_joints SET is_manually_modified = 1, size = 9, last_sync_time = NULL",
                (),
            )
            .await
            .unwrap();

        let report = import(&db, dir.path()).await;
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.updated, 0);
        let a = db.get_joint("DWG-1/A").await.unwrap();
        assert_eq!(a.data.size, Some(9.0));
        assert!(a.last_sync_time.is_some());
    }

    #[tokio::test]
    async fn deletes_stay_within_source_scope() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_export(
            dir.path(),
            "1",
            &["DWG-1,A,S1,S1-A,TP-1,,,,", "DWG-2,A,S2,S2-A,TP-2,,,,"],
        );
        import(&db, dir.path()).await;
        std::fs::remove_file(file).unwrap();

        write_export(dir.path(), "2", &["DWG-3,A,S1,S1-A,TP-1,,,,"]);
        let report = import(&db, dir.path()).await;

        assert_eq!(report.counts.deleted, 1);
        assert!(!db.get_joint("DWG-1/A").await.unwrap().lifecycle.is_active());
        assert!(db.get_joint("DWG-2/A").await.unwrap().lifecycle.is_active());
    }

    #[tokio::test]
    async fn soft_deleted_joint_is_restored() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_export(dir.path(), "1", &["DWG-1,A,S1,S1-A,TP-1,,,,", "DWG-1,B,S1,S1-A,TP-1,,,,"]);
        import(&db, dir.path()).await;
        std::fs::remove_file(&file).unwrap();
        write_export(dir.path(), "2", &["DWG-1,A,S1,S1-A,TP-1,,,,"]);
        import(&db, dir.path()).await;
        write_export(dir.path(), "3", &["DWG-1,B,S1,S1-A,TP-1,,,,"]);

        let report = import(&db, dir.path()).await;
        assert_eq!(report.restored, 1);
        assert_eq!(report.counts.updated, 1);
        assert!(db.get_joint("DWG-1/B").await.unwrap().lifecycle.is_active());

        let history = db.list_changes_for_record(TABLE, "DWG-1/B").await.unwrap();
        let kinds: Vec<_> = history.iter().map(|c| c.change_type).collect();
        assert_eq!(
            kinds,
            vec![ChangeType::Insert, ChangeType::SoftDelete, ChangeType::Restore]
        );
    }

    #[tokio::test]
    async fn duplicates_resolve_to_last_row() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        write_export(
            dir.path(),
            "1",
            &["DWG-1,A,S1,S1-A,TP-1,,2,,", "DWG-1,A,S1,S1-A,TP-1,,8,,"],
        );
        let report = import(&db, dir.path()).await;

        assert_eq!(report.counts.added, 1);
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.row_errors[0].reason, "duplicate key");
        assert_eq!(report.row_errors[0].row, 2);
        assert_eq!(db.get_joint("DWG-1/A").await.unwrap().data.size, Some(8.0));
    }

    #[tokio::test]
    async fn rejected_row_keeps_its_joint() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_export(
            dir.path(),
            "1",
            &["DWG-1,A,S1,S1-A,TP-1,,2,ACC,", "DWG-1,B,S1,S1-A,TP-1,,2,,"],
        );
        import(&db, dir.path()).await;
        std::fs::remove_file(file).unwrap();

        write_export(
            dir.path(),
            "2",
            &["DWG-1,A,S1,S1-A,TP-1,,2,BOGUS,", "DWG-1,B,S1,S1-A,TP-1,,2,,"],
        );
        let report = import(&db, dir.path()).await;

        assert_eq!(
            report.counts,
            SyncCounts {
                added: 0,
                updated: 0,
                deleted: 0,
                skipped: 1,
            }
        );
        assert_eq!(report.row_errors[0].key.as_deref(), Some("DWG-1/A"));
        let a = db.get_joint("DWG-1/A").await.unwrap();
        assert!(a.lifecycle.is_active());
        assert_eq!(a.data.results.get(NdtMethod::Vt), Some(NdtResult::Accepted));
    }

    #[tokio::test]
    async fn separator_bearing_joint_is_skipped_not_fatal() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        write_export(
            dir.path(),
            "1",
            &["A/B,C,S1,S1-A,TP-1,,,,", "A,B/C,S1,S1-A,TP-1,,,,"],
        );
        let report = import(&db, dir.path()).await;

        assert_eq!(report.counts.added, 1);
        assert_eq!(report.counts.skipped, 1);
        let stored = db.get_joint("A/B/C").await.unwrap();
        assert_eq!(stored.data.drawing_number, "A/B");
        assert_eq!(stored.data.weld_joint, "C");
    }

    #[tokio::test]
    async fn unreadable_source_is_systemic() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig::default();
        let err = RecordImporter::new(&db, &config)
            .import_records(&dir.path().join("missing"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "import_systemic_failure");
    }
}
