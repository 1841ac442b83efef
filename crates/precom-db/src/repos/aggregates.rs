//! Aggregate tables: `joint_summaries` and `nde_pwht_status`.
//!
//! Both are rebuilt wholesale; there is no per-row update path.

use std::collections::{BTreeMap, BTreeSet};

use libsql::Value;

use precom_core::entities::{JointSummary, MethodProgress, NdePwhtStatus};
use precom_core::ndt::NdtMethod;

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{count_param, get_u64, placeholders};

const SUMMARY_COLS: &str = "test_package_id, total_joints, completed_joints, remaining_joints, \
     total_din, completed_din, remaining_din";

fn nde_columns() -> Vec<String> {
    let mut cols = vec!["test_package_id".to_string()];
    for method in NdtMethod::ALL {
        let prefix = method.as_str();
        cols.push(format!("{prefix}_total"));
        cols.push(format!("{prefix}_completed"));
        cols.push(format!("{prefix}_remaining"));
    }
    cols
}

fn row_to_summary(row: &libsql::Row) -> Result<JointSummary, DatabaseError> {
    Ok(JointSummary {
        test_package_id: row.get(0)?,
        total_joints: get_u64(row, 1)?,
        completed_joints: get_u64(row, 2)?,
        remaining_joints: get_u64(row, 3)?,
        total_din: row.get(4)?,
        completed_din: row.get(5)?,
        remaining_din: row.get(6)?,
    })
}

fn row_to_nde(row: &libsql::Row) -> Result<NdePwhtStatus, DatabaseError> {
    let mut methods = BTreeMap::new();
    for (i, method) in (0..).zip(NdtMethod::ALL) {
        let base = 1 + i * 3;
        methods.insert(
            method,
            MethodProgress {
                total: get_u64(row, base)?,
                completed: get_u64(row, base + 1)?,
                remaining: get_u64(row, base + 2)?,
            },
        );
    }
    Ok(NdePwhtStatus {
        test_package_id: row.get(0)?,
        methods,
    })
}

impl PrecomDb {
    /// Replace both aggregate tables. Callers wrap this in a transaction so readers
    /// never observe a half-written set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any statement fails.
    pub async fn replace_aggregates(
        &self,
        summaries: &[JointSummary],
        statuses: &[NdePwhtStatus],
    ) -> Result<(), DatabaseError> {
        self.conn().execute("DELETE FROM joint_summaries", ()).await?;
        self.conn().execute("DELETE FROM nde_pwht_status", ()).await?;

        for summary in summaries {
            self.conn()
                .execute(
                    &format!("INSERT INTO joint_summaries ({SUMMARY_COLS}) VALUES ({})", placeholders(7)),
                    libsql::params_from_iter(vec![
                        Value::Text(summary.test_package_id.clone()),
                        Value::Integer(count_param(summary.total_joints)),
                        Value::Integer(count_param(summary.completed_joints)),
                        Value::Integer(count_param(summary.remaining_joints)),
                        Value::Real(summary.total_din),
                        Value::Real(summary.completed_din),
                        Value::Real(summary.remaining_din),
                    ]),
                )
                .await?;
        }

        let cols = nde_columns();
        let insert_nde = format!(
            "INSERT INTO nde_pwht_status ({}) VALUES ({})",
            cols.join(", "),
            placeholders(cols.len())
        );
        for status in statuses {
            let mut params = vec![Value::Text(status.test_package_id.clone())];
            for method in NdtMethod::ALL {
                let progress = status.progress(method);
                params.push(Value::Integer(count_param(progress.total)));
                params.push(Value::Integer(count_param(progress.completed)));
                params.push(Value::Integer(count_param(progress.remaining)));
            }
            self.conn()
                .execute(&insert_nde, libsql::params_from_iter(params))
                .await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_joint_summaries(&self) -> Result<Vec<JointSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SUMMARY_COLS} FROM joint_summaries ORDER BY test_package_id"),
                (),
            )
            .await?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await? {
            summaries.push(row_to_summary(&row)?);
        }
        Ok(summaries)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_nde_status(&self) -> Result<Vec<NdePwhtStatus>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {} FROM nde_pwht_status ORDER BY test_package_id",
                    nde_columns().join(", ")
                ),
                (),
            )
            .await?;
        let mut statuses = Vec::new();
        while let Some(row) = rows.next().await? {
            statuses.push(row_to_nde(&row)?);
        }
        Ok(statuses)
    }

    /// Packages currently present in either aggregate table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn aggregate_package_ids(&self) -> Result<BTreeSet<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT test_package_id FROM joint_summaries
                 UNION SELECT test_package_id FROM nde_pwht_status",
                (),
            )
            .await?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    /// Aggregate rows, across both tables, of packages with no active joint.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails.
    pub async fn count_orphaned_aggregates(&self) -> Result<u64, DatabaseError> {
        let mut orphaned = 0;
        for table in ["joint_summaries", "nde_pwht_status"] {
            orphaned += self
                .count_query(
                    &format!(
                        "SELECT COUNT(*) FROM {table} WHERE test_package_id NOT IN (
                             SELECT test_package_id FROM welding_joints
                             WHERE is_deleted = 0 AND test_package_id IS NOT NULL
                         )"
                    ),
                    Vec::new(),
                )
                .await?;
        }
        Ok(orphaned)
    }

    /// Remove aggregate rows of packages with no active joint. Returns rows removed
    /// across both tables.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a delete fails.
    pub async fn delete_orphaned_aggregates(&self) -> Result<u64, DatabaseError> {
        let mut removed = 0;
        for table in ["joint_summaries", "nde_pwht_status"] {
            removed += self
                .conn()
                .execute(
                    &format!(
                        "DELETE FROM {table} WHERE test_package_id NOT IN (
                             SELECT test_package_id FROM welding_joints
                             WHERE is_deleted = 0 AND test_package_id IS NOT NULL
                         )"
                    ),
                    (),
                )
                .await?;
        }
        Ok(removed)
    }
}
