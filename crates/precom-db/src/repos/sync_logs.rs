//! Sync log repository: one row per pipeline run.
//!
//! A row is created `running` when the run starts, optionally linked to its
//! backup once that backup completes, and finalized exactly once.

use chrono::{DateTime, Utc};
use libsql::Value;

use precom_core::entities::{SyncCounts, SyncLog};
use precom_core::enums::{BackupStatus, SyncStatus, SyncType, Trigger};
use precom_core::ids::PREFIX_SYNC;

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{
    count_param, fmt_ts, get_opt_string, get_u64, opt_text, parse_datetime, parse_enum,
    parse_optional_datetime, parse_optional_json,
};

const SELECT_COLS: &str = "id, sync_type, trigger_type, backup_id, added_count, updated_count, \
     deleted_count, skipped_count, status, start_time, end_time, duration_ms, detail, \
     error_message";

fn row_to_sync_log(row: &libsql::Row) -> Result<SyncLog, DatabaseError> {
    Ok(SyncLog {
        id: row.get(0)?,
        sync_type: parse_enum(&row.get::<String>(1)?)?,
        trigger: parse_enum(&row.get::<String>(2)?)?,
        backup_id: get_opt_string(row, 3)?,
        counts: SyncCounts {
            added: get_u64(row, 4)?,
            updated: get_u64(row, 5)?,
            deleted: get_u64(row, 6)?,
            skipped: get_u64(row, 7)?,
        },
        status: parse_enum(&row.get::<String>(8)?)?,
        start_time: parse_datetime(&row.get::<String>(9)?)?,
        end_time: parse_optional_datetime(get_opt_string(row, 10)?.as_deref())?,
        duration_ms: row.get::<Option<i64>>(11)?,
        detail: parse_optional_json(get_opt_string(row, 12)?.as_deref())?,
        error_message: get_opt_string(row, 13)?,
    })
}

/// Terminal values written when a run finishes.
#[derive(Debug, Clone)]
pub struct SyncLogFinish {
    pub status: SyncStatus,
    pub counts: SyncCounts,
    pub end_time: DateTime<Utc>,
    pub detail: serde_json::Value,
    pub error_message: Option<String>,
}

impl PrecomDb {
    /// Create a `running` sync log for a run starting at `start_time`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails.
    pub async fn create_sync_log(
        &self,
        sync_type: SyncType,
        trigger: Trigger,
        start_time: DateTime<Utc>,
    ) -> Result<SyncLog, DatabaseError> {
        let id = self.generate_id(PREFIX_SYNC).await?;
        self.conn()
            .execute(
                "INSERT INTO sync_logs (id, sync_type, trigger_type, status, start_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    id.as_str(),
                    sync_type.as_str(),
                    trigger.as_str(),
                    SyncStatus::Running.as_str(),
                    fmt_ts(start_time)
                ],
            )
            .await?;

        Ok(SyncLog {
            id,
            sync_type,
            trigger,
            backup_id: None,
            counts: SyncCounts::default(),
            status: SyncStatus::Running,
            start_time,
            end_time: None,
            duration_ms: None,
            detail: None,
            error_message: None,
        })
    }

    /// Attach a completed backup to a running sync log.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the log is no longer running or
    /// the backup is not completed.
    pub async fn link_sync_backup(&self, sync_id: &str, backup_id: &str) -> Result<(), DatabaseError> {
        let backup = self.get_backup(backup_id).await?;
        if backup.status != BackupStatus::Completed {
            return Err(DatabaseError::InvalidState(format!(
                "backup {backup_id} is {}, only completed backups can be linked",
                backup.status
            )));
        }
        let affected = self
            .conn()
            .execute(
                "UPDATE sync_logs SET backup_id = ?2 WHERE id = ?1 AND status = 'running'",
                libsql::params![sync_id, backup_id],
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::InvalidState(format!(
                "sync log {sync_id} is not running"
            )));
        }
        Ok(())
    }

    /// Finalize a running sync log. Duration is derived from the stored start time.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the log was already finalized.
    pub async fn finish_sync_log(
        &self,
        sync_id: &str,
        finish: &SyncLogFinish,
    ) -> Result<SyncLog, DatabaseError> {
        let current = self.get_sync_log(sync_id).await?;
        if !current.status.can_transition_to(finish.status) {
            return Err(DatabaseError::InvalidState(format!(
                "sync log {sync_id}: cannot transition from {} to {}",
                current.status, finish.status
            )));
        }
        let duration_ms = (finish.end_time - current.start_time).num_milliseconds();

        self.conn()
            .execute(
                "UPDATE sync_logs
                 SET status = ?2, added_count = ?3, updated_count = ?4, deleted_count = ?5,
                     skipped_count = ?6, end_time = ?7, duration_ms = ?8, detail = ?9,
                     error_message = ?10
                 WHERE id = ?1",
                libsql::params_from_iter(vec![
                    Value::Text(sync_id.to_string()),
                    Value::Text(finish.status.as_str().to_string()),
                    Value::Integer(count_param(finish.counts.added)),
                    Value::Integer(count_param(finish.counts.updated)),
                    Value::Integer(count_param(finish.counts.deleted)),
                    Value::Integer(count_param(finish.counts.skipped)),
                    Value::Text(fmt_ts(finish.end_time)),
                    Value::Integer(duration_ms),
                    Value::Text(finish.detail.to_string()),
                    opt_text(finish.error_message.as_deref()),
                ]),
            )
            .await?;

        self.get_sync_log(sync_id).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no log has this id.
    pub async fn get_sync_log(&self, id: &str) -> Result<SyncLog, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM sync_logs WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_sync_log(&row)
    }

    /// Most recent runs first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_sync_logs(&self, limit: u32) -> Result<Vec<SyncLog>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM sync_logs ORDER BY start_time DESC LIMIT ?1"),
                [i64::from(limit)],
            )
            .await?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next().await? {
            logs.push(row_to_sync_log(&row)?);
        }
        Ok(logs)
    }

    /// Finished sync logs that started before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_sync_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        self.count_query(
            "SELECT COUNT(*) FROM sync_logs WHERE start_time < ?1 AND status <> 'running'",
            vec![Value::Text(fmt_ts(cutoff))],
        )
        .await
    }

    /// Delete finished sync logs that started before `cutoff`, never touching
    /// `keep_id`. Change log rows pointing at them survive with `sync_id` nulled.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn purge_sync_logs(
        &self,
        cutoff: DateTime<Utc>,
        keep_id: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let purged = self
            .conn()
            .execute(
                "DELETE FROM sync_logs
                 WHERE start_time < ?1 AND status <> 'running' AND id IS NOT ?2",
                libsql::params_from_iter(vec![Value::Text(fmt_ts(cutoff)), opt_text(keep_id)]),
            )
            .await?;
        Ok(purged)
    }
}
