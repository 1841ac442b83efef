//! Master data repository: systems, subsystems, and test packages.
//!
//! The three tables share their bookkeeping columns and differ only in
//! descriptive attributes, so every method takes a [`MasterKind`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use libsql::Value;

use precom_core::entities::{MasterAttributes, MasterRecord};
use precom_core::enums::MasterKind;

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{
    fmt_ts, get_bool, get_lifecycle, get_opt_string, opt_text, opt_ts, parse_datetime,
    parse_enum, parse_optional_datetime, placeholders,
};

const BOOKKEEPING_COLS: [&str; 8] = [
    "data_source",
    "is_manually_modified",
    "needs_review",
    "is_deleted",
    "deleted_time",
    "last_sync_time",
    "created_at",
    "updated_at",
];

const fn attribute_columns(kind: MasterKind) -> &'static [&'static str] {
    match kind {
        MasterKind::System => &["description"],
        MasterKind::Subsystem => &["system_code", "description"],
        MasterKind::TestPackage => &["system_code", "subsystem_code", "description"],
    }
}

fn columns(kind: MasterKind) -> Vec<&'static str> {
    let mut cols = vec!["code"];
    cols.extend_from_slice(attribute_columns(kind));
    cols.extend_from_slice(&BOOKKEEPING_COLS);
    cols
}

fn select_cols(kind: MasterKind) -> String {
    columns(kind).join(", ")
}

fn row_to_master(kind: MasterKind, row: &libsql::Row) -> Result<MasterRecord, DatabaseError> {
    let mut attributes = MasterAttributes::default();
    let mut idx: i32 = 1;
    for col in attribute_columns(kind) {
        let value = get_opt_string(row, idx)?;
        match *col {
            "system_code" => attributes.system_code = value,
            "subsystem_code" => attributes.subsystem_code = value,
            _ => attributes.description = value,
        }
        idx += 1;
    }

    let updated_at = parse_datetime(&row.get::<String>(idx + 7)?)?;
    Ok(MasterRecord {
        kind,
        code: row.get(0)?,
        attributes,
        data_source: parse_enum(&row.get::<String>(idx)?)?,
        is_manually_modified: get_bool(row, idx + 1)?,
        needs_review: get_bool(row, idx + 2)?,
        lifecycle: get_lifecycle(row, idx + 3, updated_at)?,
        last_sync_time: parse_optional_datetime(get_opt_string(row, idx + 5)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(idx + 6)?)?,
        updated_at,
    })
}

fn master_values(record: &MasterRecord) -> Vec<Value> {
    let (is_deleted, deleted_time) = record.lifecycle.to_columns();
    let mut values = vec![Value::Text(record.code.clone())];
    for (_, value) in record.attributes.fields(record.kind) {
        values.push(opt_text(value.as_deref()));
    }
    values.extend([
        Value::Text(record.data_source.as_str().to_string()),
        Value::Integer(i64::from(record.is_manually_modified)),
        Value::Integer(i64::from(record.needs_review)),
        Value::Integer(i64::from(is_deleted)),
        opt_ts(deleted_time),
        opt_ts(record.last_sync_time),
        Value::Text(fmt_ts(record.created_at)),
        Value::Text(fmt_ts(record.updated_at)),
    ]);
    values
}

impl PrecomDb {
    /// # Errors
    ///
    /// Returns `DatabaseError` on constraint violation (duplicate code).
    pub async fn insert_master(&self, record: &MasterRecord) -> Result<(), DatabaseError> {
        let cols = columns(record.kind);
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    record.kind.table_name(),
                    cols.join(", "),
                    placeholders(cols.len())
                ),
                libsql::params_from_iter(master_values(record)),
            )
            .await?;
        Ok(())
    }

    /// Rewrite every column of an existing master row from `record`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no row has this code.
    pub async fn update_master(&self, record: &MasterRecord) -> Result<(), DatabaseError> {
        let cols = columns(record.kind);
        let sets = cols
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let affected = self
            .conn()
            .execute(
                &format!(
                    "UPDATE {} SET {sets} WHERE code = ?1",
                    record.kind.table_name()
                ),
                libsql::params_from_iter(master_values(record)),
            )
            .await?;
        if affected == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Refresh only `last_sync_time`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the update fails.
    pub async fn touch_master_sync(
        &self,
        kind: MasterKind,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "UPDATE {} SET last_sync_time = ?2 WHERE code = ?1",
                    kind.table_name()
                ),
                libsql::params![code, fmt_ts(now)],
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if no row has this code.
    pub async fn get_master(
        &self,
        kind: MasterKind,
        code: &str,
    ) -> Result<MasterRecord, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {} FROM {} WHERE code = ?1",
                    select_cols(kind),
                    kind.table_name()
                ),
                [code],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_master(kind, &row)
    }

    /// All rows of `kind`, including soft-deleted ones, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query or row parsing fails.
    pub async fn list_masters(&self, kind: MasterKind) -> Result<Vec<MasterRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {} FROM {} ORDER BY code",
                    select_cols(kind),
                    kind.table_name()
                ),
                (),
            )
            .await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_master(kind, &row)?);
        }
        Ok(records)
    }

    /// Codes of `kind` referenced by non-deleted joints, with the attributes
    /// derived from them.
    ///
    /// Descriptions default to the code; parent codes are the greatest value among
    /// the referencing joints.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn derived_masters(
        &self,
        kind: MasterKind,
    ) -> Result<BTreeMap<String, MasterAttributes>, DatabaseError> {
        let sql = match kind {
            MasterKind::System => {
                "SELECT system_code, NULL, NULL FROM welding_joints
                 WHERE is_deleted = 0 AND system_code <> ''
                 GROUP BY system_code"
            }
            MasterKind::Subsystem => {
                "SELECT subsystem_code, MAX(system_code), NULL FROM welding_joints
                 WHERE is_deleted = 0 AND subsystem_code <> ''
                 GROUP BY subsystem_code"
            }
            MasterKind::TestPackage => {
                "SELECT test_package_id, MAX(system_code), MAX(subsystem_code) FROM welding_joints
                 WHERE is_deleted = 0 AND test_package_id IS NOT NULL AND test_package_id <> ''
                 GROUP BY test_package_id"
            }
        };

        let mut rows = self.conn().query(sql, ()).await?;
        let mut derived = BTreeMap::new();
        while let Some(row) = rows.next().await? {
            let code: String = row.get(0)?;
            let attributes = MasterAttributes {
                system_code: get_opt_string(&row, 1)?,
                subsystem_code: get_opt_string(&row, 2)?,
                description: Some(code.clone()),
            };
            derived.insert(code, attributes);
        }
        Ok(derived)
    }

    /// Physically delete rows of `kind` soft-deleted before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn purge_deleted_masters(
        &self,
        kind: MasterKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let purged = self
            .conn()
            .execute(
                &format!(
                    "DELETE FROM {} WHERE is_deleted = 1 AND deleted_time < ?1",
                    kind.table_name()
                ),
                [fmt_ts(cutoff)],
            )
            .await?;
        Ok(purged)
    }

    /// Soft-deleted rows of `kind`, limited to those deleted before `cutoff`
    /// when given.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_deleted_masters(
        &self,
        kind: MasterKind,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<u64, DatabaseError> {
        self.count_query(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE is_deleted = 1 AND (?1 IS NULL OR deleted_time < ?1)",
                kind.table_name()
            ),
            vec![opt_ts(cutoff)],
        )
        .await
    }

    /// Replace the whole table of `kind` with `records`. Used by backup restore
    /// inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if a record is of another kind.
    pub async fn replace_masters(
        &self,
        kind: MasterKind,
        records: &[MasterRecord],
    ) -> Result<(), DatabaseError> {
        if let Some(stray) = records.iter().find(|r| r.kind != kind) {
            return Err(DatabaseError::InvalidState(format!(
                "{} '{}' cannot be restored into {}",
                stray.kind,
                stray.code,
                kind.table_name()
            )));
        }
        self.conn()
            .execute(&format!("DELETE FROM {}", kind.table_name()), ())
            .await?;
        for record in records {
            self.insert_master(record).await?;
        }
        Ok(())
    }
}
