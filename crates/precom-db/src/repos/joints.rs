//! Welding joint repository.
//!
//! Rows are never physically deleted by the importer; removal is a lifecycle
//! change. Only retention purges and backup restores issue `DELETE`.

use chrono::{DateTime, Utc};
use libsql::Value;

use precom_core::entities::{JointData, WeldingJoint};
use precom_core::lifecycle::Lifecycle;
use precom_core::ndt::{NdtMethod, NdtResult, NdtResults};

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{
    fmt_ts, get_bool, get_lifecycle, get_opt_string, opt_text, opt_ts, parse_datetime,
    parse_optional_date, parse_optional_datetime, placeholders,
};

const SELECT_COLS: &str = "weld_id, drawing_number, weld_joint, page_number, pipeline_number, \
     revision, contractor, system_code, subsystem_code, test_package_id, weld_date, size, \
     vt_result, rt_result, pt_result, ut_result, mt_result, pmi_result, ft_result, ht_result, \
     pwht_result, is_manually_modified, is_deleted, deleted_time, last_sync_time, created_at, \
     updated_at";
const COLUMN_COUNT: usize = 27;

/// Columns rewritten when source data is applied to an existing row, in bind order
/// after `weld_id`.
const DATA_COLUMNS: [&str; 18] = [
    "page_number",
    "pipeline_number",
    "revision",
    "contractor",
    "system_code",
    "subsystem_code",
    "test_package_id",
    "weld_date",
    "size",
    "vt_result",
    "rt_result",
    "pt_result",
    "ut_result",
    "mt_result",
    "pmi_result",
    "ft_result",
    "ht_result",
    "pwht_result",
];

const RESULT_OFFSET: i32 = 12;

fn row_to_joint(row: &libsql::Row) -> Result<WeldingJoint, DatabaseError> {
    let mut results = NdtResults::default();
    for (offset, method) in (0..).zip(NdtMethod::ALL) {
        let stored = get_opt_string(row, RESULT_OFFSET + offset)?;
        let result = match stored {
            Some(value) => Some(NdtResult::from_stored(&value).ok_or_else(|| {
                DatabaseError::InvalidState(format!("unknown {method} result '{value}'"))
            })?),
            None => None,
        };
        results.set(method, result);
    }

    let updated_at = parse_datetime(&row.get::<String>(26)?)?;
    Ok(WeldingJoint {
        weld_id: row.get(0)?,
        data: JointData {
            drawing_number: row.get(1)?,
            weld_joint: row.get(2)?,
            page_number: get_opt_string(row, 3)?,
            pipeline_number: get_opt_string(row, 4)?,
            revision: get_opt_string(row, 5)?,
            contractor: get_opt_string(row, 6)?,
            system_code: row.get(7)?,
            subsystem_code: row.get(8)?,
            test_package_id: get_opt_string(row, 9)?,
            weld_date: parse_optional_date(get_opt_string(row, 10)?.as_deref())?,
            size: row.get::<Option<f64>>(11)?,
            results,
        },
        is_manually_modified: get_bool(row, 21)?,
        lifecycle: get_lifecycle(row, 22, updated_at)?,
        last_sync_time: parse_optional_datetime(get_opt_string(row, 24)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(25)?)?,
        updated_at,
    })
}

fn data_values(data: &JointData) -> Vec<Value> {
    let mut values = vec![
        opt_text(data.page_number.as_deref()),
        opt_text(data.pipeline_number.as_deref()),
        opt_text(data.revision.as_deref()),
        opt_text(data.contractor.as_deref()),
        Value::Text(data.system_code.clone()),
        Value::Text(data.subsystem_code.clone()),
        opt_text(data.test_package_id.as_deref()),
        data.weld_date
            .map_or(Value::Null, |d| Value::Text(d.format("%Y-%m-%d").to_string())),
        data.size.map_or(Value::Null, Value::Real),
    ];
    for method in NdtMethod::ALL {
        values.push(opt_text(data.results.get(method).map(NdtResult::as_str)));
    }
    values
}

fn joint_values(joint: &WeldingJoint) -> Vec<Value> {
    let (is_deleted, deleted_time) = joint.lifecycle.to_columns();
    let mut values = vec![
        Value::Text(joint.weld_id.clone()),
        Value::Text(joint.data.drawing_number.clone()),
        Value::Text(joint.data.weld_joint.clone()),
    ];
    values.extend(data_values(&joint.data));
    values.extend([
        Value::Integer(i64::from(joint.is_manually_modified)),
        Value::Integer(i64::from(is_deleted)),
        opt_ts(deleted_time),
        opt_ts(joint.last_sync_time),
        Value::Text(fmt_ts(joint.created_at)),
        Value::Text(fmt_ts(joint.updated_at)),
    ]);
    values
}

impl PrecomDb {
    /// Insert a new joint row.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on constraint violation (duplicate key).
    pub async fn insert_joint(&self, joint: &WeldingJoint) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO welding_joints ({SELECT_COLS}) VALUES ({})",
                    placeholders(COLUMN_COUNT)
                ),
                libsql::params_from_iter(joint_values(joint)),
            )
            .await?;
        Ok(())
    }

    /// Every joint, including soft-deleted ones, ordered by `weld_id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query or row parsing fails.
    pub async fn list_joints(&self) -> Result<Vec<WeldingJoint>, DatabaseError> {
        self.query_joints(&format!(
            "SELECT {SELECT_COLS} FROM welding_joints ORDER BY weld_id"
        ))
        .await
    }

    /// Non-deleted joints ordered by `weld_id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query or row parsing fails.
    pub async fn list_active_joints(&self) -> Result<Vec<WeldingJoint>, DatabaseError> {
        self.query_joints(&format!(
            "SELECT {SELECT_COLS} FROM welding_joints WHERE is_deleted = 0 ORDER BY weld_id"
        ))
        .await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no joint has this id.
    pub async fn get_joint(&self, weld_id: &str) -> Result<WeldingJoint, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM welding_joints WHERE weld_id = ?1"),
                [weld_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_joint(&row)
    }

    /// Overwrite the source-owned fields and lifecycle of an existing joint.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the row does not exist.
    pub async fn update_joint_data(
        &self,
        weld_id: &str,
        data: &JointData,
        lifecycle: Lifecycle,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let (is_deleted, deleted_time) = lifecycle.to_columns();
        let sets = DATA_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let base = DATA_COLUMNS.len() + 2;
        let sql = format!(
            "UPDATE welding_joints SET {sets}, is_deleted = ?{}, deleted_time = ?{}, \
             last_sync_time = ?{}, updated_at = ?{} WHERE weld_id = ?1",
            base,
            base + 1,
            base + 2,
            base + 2
        );

        let mut params = vec![Value::Text(weld_id.to_string())];
        params.extend(data_values(data));
        params.extend([
            Value::Integer(i64::from(is_deleted)),
            opt_ts(deleted_time),
            Value::Text(fmt_ts(now)),
        ]);

        let affected = self
            .conn()
            .execute(&sql, libsql::params_from_iter(params))
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Record that a joint was seen in the source without changing its content.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the update fails.
    pub async fn touch_joint_sync(
        &self,
        weld_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE welding_joints SET last_sync_time = ?2 WHERE weld_id = ?1",
                libsql::params![weld_id, fmt_ts(now)],
            )
            .await?;
        Ok(())
    }

    /// Persist a lifecycle change.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the row does not exist.
    pub async fn set_joint_lifecycle(
        &self,
        weld_id: &str,
        lifecycle: Lifecycle,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let (is_deleted, deleted_time) = lifecycle.to_columns();
        let affected = self
            .conn()
            .execute(
                "UPDATE welding_joints SET is_deleted = ?2, deleted_time = ?3, updated_at = ?4
                 WHERE weld_id = ?1",
                libsql::params_from_iter(vec![
                    Value::Text(weld_id.to_string()),
                    Value::Integer(i64::from(is_deleted)),
                    opt_ts(deleted_time),
                    Value::Text(fmt_ts(now)),
                ]),
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Physically delete joints soft-deleted before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn purge_deleted_joints(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let purged = self
            .conn()
            .execute(
                "DELETE FROM welding_joints WHERE is_deleted = 1 AND deleted_time < ?1",
                [fmt_ts(cutoff)],
            )
            .await?;
        Ok(purged)
    }

    /// Soft-deleted joints, limited to those deleted before `cutoff` when given.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_deleted_joints(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<u64, DatabaseError> {
        self.count_query(
            "SELECT COUNT(*) FROM welding_joints
             WHERE is_deleted = 1 AND (?1 IS NULL OR deleted_time < ?1)",
            vec![opt_ts(cutoff)],
        )
        .await
    }

    /// Hand a joint to operators: later imports only touch it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the row does not exist.
    pub async fn set_joint_manual(
        &self,
        weld_id: &str,
        manual: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE welding_joints SET is_manually_modified = ?2, updated_at = ?3
                 WHERE weld_id = ?1",
                libsql::params![weld_id, i64::from(manual), fmt_ts(now)],
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Replace the whole table with `joints`. Used by backup restore inside a
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any statement fails.
    pub async fn replace_joints(&self, joints: &[WeldingJoint]) -> Result<(), DatabaseError> {
        self.conn().execute("DELETE FROM welding_joints", ()).await?;
        for joint in joints {
            self.insert_joint(joint).await?;
        }
        Ok(())
    }

    async fn query_joints(&self, sql: &str) -> Result<Vec<WeldingJoint>, DatabaseError> {
        let mut rows = self.conn().query(sql, ()).await?;
        let mut joints = Vec::new();
        while let Some(row) = rows.next().await? {
            joints.push(row_to_joint(&row)?);
        }
        Ok(joints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use precom_core::entities::JointKey;

    async fn test_db() -> PrecomDb {
        PrecomDb::open_local(":memory:").await.unwrap()
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 8, 0, 0).unwrap()
    }

    fn joint(drawing: &str, weld: &str) -> WeldingJoint {
        let mut results = NdtResults::default();
        results.set(NdtMethod::Vt, Some(NdtResult::Accepted));
        results.set(NdtMethod::Rt, Some(NdtResult::Pending));
        WeldingJoint {
            weld_id: JointKey::new(drawing, weld).weld_id(),
            data: JointData {
                drawing_number: drawing.into(),
                weld_joint: weld.into(),
                page_number: Some("1".into()),
                pipeline_number: None,
                revision: Some("B".into()),
                contractor: Some("ACME".into()),
                system_code: "S1".into(),
                subsystem_code: "S1-01".into(),
                test_package_id: Some("TP-1".into()),
                weld_date: NaiveDate::from_ymd_opt(2026, 3, 2),
                size: Some(2.5),
                results,
            },
            is_manually_modified: false,
            lifecycle: Lifecycle::Active,
            last_sync_time: Some(ts(1)),
            created_at: ts(1),
            updated_at: ts(1),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let db = test_db().await;
        let original = joint("D-1", "W1");
        db.insert_joint(&original).await.unwrap();

        let loaded = db.get_joint("D-1/W1").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn duplicate_natural_key_is_rejected() {
        let db = test_db().await;
        db.insert_joint(&joint("D-1", "W1")).await.unwrap();
        let mut clash = joint("D-1", "W1");
        clash.weld_id = "other-id".into();
        assert!(db.insert_joint(&clash).await.is_err());
    }

    #[tokio::test]
    async fn update_data_and_lifecycle() {
        let db = test_db().await;
        db.insert_joint(&joint("D-1", "W1")).await.unwrap();

        let mut data = joint("D-1", "W1").data;
        data.size = None;
        data.results.set(NdtMethod::Rt, Some(NdtResult::Rejected));
        db.update_joint_data("D-1/W1", &data, Lifecycle::Active, ts(3))
            .await
            .unwrap();

        let loaded = db.get_joint("D-1/W1").await.unwrap();
        assert_eq!(loaded.data, data);
        assert_eq!(loaded.last_sync_time, Some(ts(3)));
        assert_eq!(loaded.updated_at, ts(3));
        assert_eq!(loaded.created_at, ts(1));
    }

    #[tokio::test]
    async fn update_missing_row_is_no_result() {
        let db = test_db().await;
        let data = joint("D-1", "W1").data;
        let err = db
            .update_joint_data("D-1/W1", &data, Lifecycle::Active, ts(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NoResult));
    }

    #[tokio::test]
    async fn soft_deleted_rows_leave_active_listing() {
        let db = test_db().await;
        db.insert_joint(&joint("D-1", "W1")).await.unwrap();
        db.insert_joint(&joint("D-1", "W2")).await.unwrap();

        let deleted = Lifecycle::Active.soft_delete(ts(4)).unwrap();
        db.set_joint_lifecycle("D-1/W2", deleted, ts(4)).await.unwrap();

        let active = db.list_active_joints().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].weld_id, "D-1/W1");
        assert_eq!(db.list_joints().await.unwrap().len(), 2);
        assert_eq!(
            db.get_joint("D-1/W2").await.unwrap().lifecycle.deleted_at(),
            Some(ts(4))
        );
    }

    #[tokio::test]
    async fn purge_only_removes_old_soft_deletes() {
        let db = test_db().await;
        for weld in ["W1", "W2", "W3"] {
            db.insert_joint(&joint("D-1", weld)).await.unwrap();
        }
        db.set_joint_lifecycle("D-1/W1", Lifecycle::SoftDeleted { deleted_at: ts(1) }, ts(1))
            .await
            .unwrap();
        db.set_joint_lifecycle("D-1/W2", Lifecycle::SoftDeleted { deleted_at: ts(20) }, ts(20))
            .await
            .unwrap();

        let purged = db.purge_deleted_joints(ts(20) - Duration::days(5)).await.unwrap();
        assert_eq!(purged, 1);
        let remaining: Vec<_> = db
            .list_joints()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.weld_id)
            .collect();
        assert_eq!(remaining, vec!["D-1/W2".to_string(), "D-1/W3".to_string()]);
    }

    #[tokio::test]
    async fn deleted_count_honours_cutoff() {
        let db = test_db().await;
        for weld in ["W1", "W2", "W3"] {
            db.insert_joint(&joint("D-1", weld)).await.unwrap();
        }
        db.set_joint_lifecycle("D-1/W1", Lifecycle::SoftDeleted { deleted_at: ts(1) }, ts(1))
            .await
            .unwrap();
        db.set_joint_lifecycle("D-1/W2", Lifecycle::SoftDeleted { deleted_at: ts(20) }, ts(20))
            .await
            .unwrap();

        assert_eq!(db.count_deleted_joints(None).await.unwrap(), 2);
        assert_eq!(db.count_deleted_joints(Some(ts(10))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn manual_flag_is_persisted() {
        let db = test_db().await;
        db.insert_joint(&joint("D-1", "W1")).await.unwrap();
        db.set_joint_manual("D-1/W1", true, ts(5)).await.unwrap();

        let loaded = db.get_joint("D-1/W1").await.unwrap();
        assert!(loaded.is_manually_modified);
        assert_eq!(loaded.updated_at, ts(5));
        assert!(matches!(
            db.set_joint_manual("D-1/W9", true, ts(5)).await,
            Err(DatabaseError::NoResult)
        ));
    }
}
