//! Change log repository.
//!
//! Append-only audit entries: one per inserted row, changed field, lifecycle
//! change, or restored table. Rows outlive their sync log.

use chrono::{DateTime, Utc};
use libsql::Value;

use precom_core::entities::{ChangeLogEntry, NewChange};

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{fmt_ts, get_opt_string, opt_text, parse_datetime, parse_enum};

const SELECT_COLS: &str = "id, sync_id, table_name, record_id, change_type, field_name, \
     old_value, new_value, actor, source, changed_at";

fn row_to_entry(row: &libsql::Row) -> Result<ChangeLogEntry, DatabaseError> {
    Ok(ChangeLogEntry {
        id: row.get(0)?,
        sync_id: get_opt_string(row, 1)?,
        table_name: row.get(2)?,
        record_id: row.get(3)?,
        change_type: parse_enum(&row.get::<String>(4)?)?,
        field_name: get_opt_string(row, 5)?,
        old_value: get_opt_string(row, 6)?,
        new_value: get_opt_string(row, 7)?,
        actor: row.get(8)?,
        source: row.get(9)?,
        changed_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

impl PrecomDb {
    /// Append one change. Returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails (e.g. unknown `sync_id`).
    pub async fn append_change(
        &self,
        change: &NewChange,
        changed_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO change_logs (sync_id, table_name, record_id, change_type, field_name,
                                          old_value, new_value, actor, source, changed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                libsql::params_from_iter(vec![
                    opt_text(change.sync_id.as_deref()),
                    Value::Text(change.table_name.clone()),
                    Value::Text(change.record_id.clone()),
                    Value::Text(change.change_type.as_str().to_string()),
                    opt_text(change.field_name.as_deref()),
                    opt_text(change.old_value.as_deref()),
                    opt_text(change.new_value.as_deref()),
                    Value::Text(change.actor.clone()),
                    Value::Text(change.source.clone()),
                    Value::Text(fmt_ts(changed_at)),
                ]),
            )
            .await?;
        Ok(self.conn().last_insert_rowid())
    }

    /// History of one record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_changes_for_record(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<Vec<ChangeLogEntry>, DatabaseError> {
        self.query_changes(
            &format!(
                "SELECT {SELECT_COLS} FROM change_logs
                 WHERE table_name = ?1 AND record_id = ?2 ORDER BY id"
            ),
            vec![
                Value::Text(table_name.to_string()),
                Value::Text(record_id.to_string()),
            ],
        )
        .await
    }

    /// Changes recorded by one run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_changes_for_sync(
        &self,
        sync_id: &str,
    ) -> Result<Vec<ChangeLogEntry>, DatabaseError> {
        self.query_changes(
            &format!("SELECT {SELECT_COLS} FROM change_logs WHERE sync_id = ?1 ORDER BY id"),
            vec![Value::Text(sync_id.to_string())],
        )
        .await
    }

    /// Entries recorded before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_change_logs_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        self.count_query(
            "SELECT COUNT(*) FROM change_logs WHERE changed_at < ?1",
            vec![Value::Text(fmt_ts(cutoff))],
        )
        .await
    }

    /// Delete entries recorded before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn purge_change_logs(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let purged = self
            .conn()
            .execute(
                "DELETE FROM change_logs WHERE changed_at < ?1",
                [fmt_ts(cutoff)],
            )
            .await?;
        Ok(purged)
    }

    async fn query_changes(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<ChangeLogEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, libsql::params_from_iter(params))
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use precom_core::entities::SyncCounts;
    use precom_core::enums::{ChangeType, SyncStatus, SyncType, Trigger};

    use crate::repos::sync_logs::SyncLogFinish;

    async fn test_db() -> PrecomDb {
        PrecomDb::open_local(":memory:").await.unwrap()
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let db = test_db().await;
        let change = NewChange::new("welding_joints", "D/W1", ChangeType::Update)
            .field("size", Some("2".into()), Some("4".into()))
            .by("sync", "welding_import");

        let first = db.append_change(&change, ts(1)).await.unwrap();
        let second = db.append_change(&change, ts(1)).await.unwrap();
        assert!(second > first);

        let history = db.list_changes_for_record("welding_joints", "D/W1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].field_name.as_deref(), Some("size"));
        assert_eq!(history[0].new_value.as_deref(), Some("4"));
        assert_eq!(history[0].change_type, ChangeType::Update);
    }

    #[tokio::test]
    async fn purging_sync_log_nulls_reference() {
        let db = test_db().await;
        let log = db
            .create_sync_log(SyncType::WeldingImport, Trigger::Scheduled, ts(1))
            .await
            .unwrap();
        let change = NewChange::new("welding_joints", "D/W1", ChangeType::Insert)
            .sync(Some(&log.id))
            .by("sync", "welding_import");
        let change_id = db.append_change(&change, ts(1)).await.unwrap();

        db.finish_sync_log(
            &log.id,
            &SyncLogFinish {
                status: SyncStatus::Completed,
                counts: SyncCounts::default(),
                end_time: ts(1),
                detail: serde_json::json!({}),
                error_message: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(db.purge_sync_logs(ts(5), None).await.unwrap(), 1);

        let history = db.list_changes_for_record("welding_joints", "D/W1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, change_id);
        assert_eq!(history[0].sync_id, None);
    }

    #[tokio::test]
    async fn purge_by_age() {
        let db = test_db().await;
        let change = NewChange::new("systems", "S1", ChangeType::SoftDelete).by("sync", "master_sync");
        db.append_change(&change, ts(1)).await.unwrap();
        db.append_change(&change, ts(9)).await.unwrap();

        assert_eq!(db.purge_change_logs(ts(5)).await.unwrap(), 1);
        assert_eq!(db.list_changes_for_record("systems", "S1").await.unwrap().len(), 1);
    }
}
