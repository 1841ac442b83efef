//! Backup metadata repository.
//!
//! The snapshot files themselves are written by the pipeline crate; this table
//! records their manifest, counts, status, and retention.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use libsql::Value;

use precom_core::entities::Backup;
use precom_core::enums::BackupStatus;

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{
    count_param, fmt_ts, get_bool, get_opt_string, get_u64, opt_text, parse_datetime,
    parse_enum, parse_json,
};

const SELECT_COLS: &str = "id, backup_type, trigger_type, backup_time, backup_by, description, \
     table_counts, manifest, size_bytes, status, error_message, retention_expiry, is_retained, \
     created_at";

fn row_to_backup(row: &libsql::Row) -> Result<Backup, DatabaseError> {
    Ok(Backup {
        id: row.get(0)?,
        backup_type: parse_enum(&row.get::<String>(1)?)?,
        trigger: parse_enum(&row.get::<String>(2)?)?,
        backup_time: parse_datetime(&row.get::<String>(3)?)?,
        backup_by: row.get(4)?,
        description: get_opt_string(row, 5)?,
        table_counts: parse_json(&row.get::<String>(6)?)?,
        manifest: parse_json(&row.get::<String>(7)?)?,
        size_bytes: get_u64(row, 8)?,
        status: parse_enum(&row.get::<String>(9)?)?,
        error_message: get_opt_string(row, 10)?,
        retention_expiry: parse_datetime(&row.get::<String>(11)?)?,
        is_retained: get_bool(row, 12)?,
        created_at: parse_datetime(&row.get::<String>(13)?)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Other(e.into()))
}

impl PrecomDb {
    /// Insert a backup row, normally in `running` status.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails.
    pub async fn insert_backup(&self, backup: &Backup) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO data_backups ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                libsql::params_from_iter(vec![
                    Value::Text(backup.id.clone()),
                    Value::Text(backup.backup_type.as_str().to_string()),
                    Value::Text(backup.trigger.as_str().to_string()),
                    Value::Text(fmt_ts(backup.backup_time)),
                    Value::Text(backup.backup_by.clone()),
                    opt_text(backup.description.as_deref()),
                    Value::Text(to_json(&backup.table_counts)?),
                    Value::Text(to_json(&backup.manifest)?),
                    Value::Integer(count_param(backup.size_bytes)),
                    Value::Text(backup.status.as_str().to_string()),
                    opt_text(backup.error_message.as_deref()),
                    Value::Text(fmt_ts(backup.retention_expiry)),
                    Value::Integer(i64::from(backup.is_retained)),
                    Value::Text(fmt_ts(backup.created_at)),
                ]),
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no backup has this id.
    pub async fn get_backup(&self, id: &str) -> Result<Backup, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM data_backups WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_backup(&row)
    }

    /// Most recent backups first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_backups(&self, limit: u32) -> Result<Vec<Backup>, DatabaseError> {
        self.query_backups(
            &format!("SELECT {SELECT_COLS} FROM data_backups ORDER BY backup_time DESC LIMIT ?1"),
            vec![Value::Integer(i64::from(limit))],
        )
        .await
    }

    /// Newest completed backup taken at or before `at`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn latest_completed_backup_at(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Option<Backup>, DatabaseError> {
        let mut found = self
            .query_backups(
                &format!(
                    "SELECT {SELECT_COLS} FROM data_backups
                     WHERE status = 'completed' AND backup_time <= ?1
                     ORDER BY backup_time DESC LIMIT 1"
                ),
                vec![Value::Text(fmt_ts(at))],
            )
            .await?;
        Ok(found.pop())
    }

    /// Backups flagged for physical deletion.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_unretained_backups(&self) -> Result<Vec<Backup>, DatabaseError> {
        self.query_backups(
            &format!(
                "SELECT {SELECT_COLS} FROM data_backups
                 WHERE is_retained = 0 AND status <> 'running'
                 ORDER BY backup_time"
            ),
            Vec::new(),
        )
        .await
    }

    /// Move a running backup to `completed`, recording what was written.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the backup is not running.
    pub async fn complete_backup(
        &self,
        id: &str,
        table_counts: &BTreeMap<String, u64>,
        manifest: &BTreeMap<String, String>,
        size_bytes: u64,
    ) -> Result<(), DatabaseError> {
        self.check_backup_transition(id, BackupStatus::Completed)
            .await?;
        self.conn()
            .execute(
                "UPDATE data_backups
                 SET status = ?2, table_counts = ?3, manifest = ?4, size_bytes = ?5
                 WHERE id = ?1",
                libsql::params_from_iter(vec![
                    Value::Text(id.to_string()),
                    Value::Text(BackupStatus::Completed.as_str().to_string()),
                    Value::Text(to_json(table_counts)?),
                    Value::Text(to_json(manifest)?),
                    Value::Integer(count_param(size_bytes)),
                ]),
            )
            .await?;
        Ok(())
    }

    /// Move a running backup to `failed`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the backup is not running.
    pub async fn fail_backup(&self, id: &str, message: &str) -> Result<(), DatabaseError> {
        self.check_backup_transition(id, BackupStatus::Failed)
            .await?;
        self.conn()
            .execute(
                "UPDATE data_backups SET status = ?2, error_message = ?3 WHERE id = ?1",
                libsql::params![id, BackupStatus::Failed.as_str(), message],
            )
            .await?;
        Ok(())
    }

    /// Flag finished backups past their retention expiry as not retained, sparing
    /// the `min_keep` most recent completed ones. Returns the number flagged.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the update fails.
    pub async fn mark_expired_backups(
        &self,
        now: DateTime<Utc>,
        min_keep: u32,
    ) -> Result<u64, DatabaseError> {
        let marked = self
            .conn()
            .execute(
                "UPDATE data_backups SET is_retained = 0
                 WHERE is_retained = 1
                   AND status <> 'running'
                   AND retention_expiry < ?1
                   AND id NOT IN (
                       SELECT id FROM data_backups
                       WHERE status = 'completed'
                       ORDER BY backup_time DESC
                       LIMIT ?2
                   )",
                libsql::params![fmt_ts(now), i64::from(min_keep)],
            )
            .await?;
        Ok(marked)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn delete_backup(&self, id: &str) -> Result<u64, DatabaseError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM data_backups WHERE id = ?1", [id])
            .await?;
        Ok(deleted)
    }

    async fn check_backup_transition(
        &self,
        id: &str,
        next: BackupStatus,
    ) -> Result<(), DatabaseError> {
        let current = self.get_backup(id).await?.status;
        if !current.can_transition_to(next) {
            return Err(DatabaseError::InvalidState(format!(
                "backup {id}: cannot transition from {current} to {next}"
            )));
        }
        Ok(())
    }

    async fn query_backups(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Backup>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, libsql::params_from_iter(params))
            .await?;
        let mut backups = Vec::new();
        while let Some(row) = rows.next().await? {
            backups.push(row_to_backup(&row)?);
        }
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use precom_core::enums::{BackupType, Trigger};
    use precom_core::ids::PREFIX_BACKUP;

    async fn test_db() -> PrecomDb {
        PrecomDb::open_local(":memory:").await.unwrap()
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, 12, 0, 0).unwrap()
    }

    async fn running_backup(db: &PrecomDb, time: DateTime<Utc>) -> Backup {
        let backup = Backup {
            id: db.generate_id(PREFIX_BACKUP).await.unwrap(),
            backup_type: BackupType::Full,
            trigger: Trigger::Scheduled,
            backup_time: time,
            backup_by: "system".into(),
            description: None,
            table_counts: BTreeMap::new(),
            manifest: BTreeMap::new(),
            size_bytes: 0,
            status: BackupStatus::Running,
            error_message: None,
            retention_expiry: time + Duration::days(2),
            is_retained: true,
            created_at: time,
        };
        db.insert_backup(&backup).await.unwrap();
        backup
    }

    #[tokio::test]
    async fn complete_records_manifest() {
        let db = test_db().await;
        let backup = running_backup(&db, ts(1)).await;

        let counts = BTreeMap::from([("welding_joints".to_string(), 3_u64)]);
        let manifest = BTreeMap::from([(
            "welding_joints".to_string(),
            "/tmp/b/welding_joints.jsonl".to_string(),
        )]);
        db.complete_backup(&backup.id, &counts, &manifest, 512)
            .await
            .unwrap();

        let loaded = db.get_backup(&backup.id).await.unwrap();
        assert_eq!(loaded.status, BackupStatus::Completed);
        assert_eq!(loaded.table_counts, counts);
        assert_eq!(loaded.manifest, manifest);
        assert_eq!(loaded.size_bytes, 512);
    }

    #[tokio::test]
    async fn completed_backup_is_immutable() {
        let db = test_db().await;
        let backup = running_backup(&db, ts(1)).await;
        db.complete_backup(&backup.id, &BTreeMap::new(), &BTreeMap::new(), 0)
            .await
            .unwrap();

        let err = db.fail_backup(&backup.id, "late failure").await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidState(_)));
    }

    #[tokio::test]
    async fn mark_expired_spares_newest() {
        let db = test_db().await;
        let mut ids = Vec::new();
        for day in 1..=4 {
            let backup = running_backup(&db, ts(day)).await;
            db.complete_backup(&backup.id, &BTreeMap::new(), &BTreeMap::new(), 0)
                .await
                .unwrap();
            ids.push(backup.id);
        }

        // All four expired by day 20; the two newest are kept.
        let marked = db.mark_expired_backups(ts(20), 2).await.unwrap();
        assert_eq!(marked, 2);

        let unretained: Vec<_> = db
            .list_unretained_backups()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(unretained, ids[..2].to_vec());
        assert_eq!(db.mark_expired_backups(ts(20), 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn latest_completed_at_skips_newer_and_unfinished() {
        let db = test_db().await;
        let mut completed = Vec::new();
        for day in [1, 5, 9] {
            let backup = running_backup(&db, ts(day)).await;
            db.complete_backup(&backup.id, &BTreeMap::new(), &BTreeMap::new(), 0)
                .await
                .unwrap();
            completed.push(backup.id);
        }
        running_backup(&db, ts(6)).await;

        let found = db.latest_completed_backup_at(ts(7)).await.unwrap().unwrap();
        assert_eq!(found.id, completed[1]);
        let exact = db.latest_completed_backup_at(ts(9)).await.unwrap().unwrap();
        assert_eq!(exact.id, completed[2]);
        assert!(db.latest_completed_backup_at(ts(1) - Duration::hours(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = test_db().await;
        let old = running_backup(&db, ts(1)).await;
        let new = running_backup(&db, ts(2)).await;

        let listed: Vec<_> = db
            .list_backups(10)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(listed, vec![new.id, old.id]);
    }
}
