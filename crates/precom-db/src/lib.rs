//! # precom-db
//!
//! libSQL storage for Precom: welding joint records, master data (systems,
//! subsystems, test packages), backups, sync and change logs, aggregates, and
//! the pipeline run lease.
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29) against a local file. One
//! [`PrecomDb`] owns one connection; pipeline phases wrap their work in
//! [`PrecomDb::begin`] / [`PrecomDb::commit`] so every repository call made through
//! the handle in between is part of the same transaction.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;

use error::DatabaseError;
use libsql::Builder;
use precom_core::enums::SnapshotTable;

/// Central database handle for all Precom state operations.
///
/// Wraps a libSQL database and connection. Repository methods live in
/// `impl PrecomDb` blocks under [`repos`].
pub struct PrecomDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl PrecomDb {
    /// Open a local database at the given path. `":memory:"` opens a throwaway one.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let precom_db = Self { db, conn };
        precom_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(precom_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"syn-a3f8b2c1"`.
    ///
    /// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
                (),
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }

    /// Start a write transaction on this handle's connection (`BEGIN IMMEDIATE`).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a transaction is already open or the lock is busy.
    pub async fn begin(&self) -> Result<(), DatabaseError> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if no transaction is open or the commit fails.
    pub async fn commit(&self) -> Result<(), DatabaseError> {
        self.conn.execute("COMMIT", ()).await?;
        Ok(())
    }

    /// Roll back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if no transaction is open.
    pub async fn rollback(&self) -> Result<(), DatabaseError> {
        self.conn.execute("ROLLBACK", ()).await?;
        Ok(())
    }

    /// Row count of a snapshot table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_rows(&self, table: SnapshotTable) -> Result<u64, DatabaseError> {
        self.count_query(&format!("SELECT COUNT(*) FROM {}", table.as_str()), Vec::new())
            .await
    }

    /// Rows of a snapshot table that are not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn count_active_rows(&self, table: SnapshotTable) -> Result<u64, DatabaseError> {
        self.count_query(
            &format!("SELECT COUNT(*) FROM {} WHERE is_deleted = 0", table.as_str()),
            Vec::new(),
        )
        .await
    }

    pub(crate) async fn count_query(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, libsql::params_from_iter(params))
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        helpers::get_u64(&row, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn test_db() -> PrecomDb {
        PrecomDb::open_local(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_local_creates_schema() {
        let db = test_db().await;

        let tables = [
            "welding_joints",
            "systems",
            "subsystems",
            "test_packages",
            "data_backups",
            "sync_logs",
            "change_logs",
            "joint_summaries",
            "nde_pwht_status",
            "run_leases",
        ];
        for table in &tables {
            let mut rows = db
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn generate_id_correct_format() {
        let db = test_db().await;
        let id = db.generate_id("syn").await.unwrap();
        assert!(id.starts_with("syn-"), "ID should start with 'syn-': {id}");
        assert_eq!(id.len(), 12);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn generate_id_uniqueness() {
        let db = test_db().await;
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let id = db.generate_id(precom_core::ids::PREFIX_BACKUP).await.unwrap();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {id}");
        }
    }

    #[tokio::test]
    async fn idempotent_migrations() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let db = test_db().await;
        db.begin().await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO run_leases (name, holder, acquired_at, expires_at) VALUES ('x', 'h', 'a', 'b')",
                (),
            )
            .await
            .unwrap();
        db.rollback().await.unwrap();

        let mut rows = db
            .conn()
            .query("SELECT COUNT(*) FROM run_leases", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn count_rows_on_empty_tables() {
        let db = test_db().await;
        for table in SnapshotTable::ALL {
            assert_eq!(db.count_rows(table).await.unwrap(), 0);
            assert_eq!(db.count_active_rows(table).await.unwrap(), 0);
        }
    }
}
