//! Pipeline run lease.
//!
//! A single row per lease name. Acquisition is one upsert that only overwrites
//! an expired row, so two processes racing for the lease cannot both win.

use chrono::{DateTime, Duration, Utc};

use precom_core::entities::RunLease;

use crate::PrecomDb;
use crate::error::DatabaseError;
use crate::helpers::{fmt_ts, parse_datetime};

fn row_to_lease(row: &libsql::Row) -> Result<RunLease, DatabaseError> {
    Ok(RunLease {
        name: row.get(0)?,
        holder: row.get(1)?,
        acquired_at: parse_datetime(&row.get::<String>(2)?)?,
        expires_at: parse_datetime(&row.get::<String>(3)?)?,
    })
}

impl PrecomDb {
    /// Take the lease `name` for `holder` until `now + ttl`.
    ///
    /// Succeeds when no row exists or the existing row has expired.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LeaseHeld` when another holder owns an unexpired lease.
    pub async fn acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<RunLease, DatabaseError> {
        let lease = RunLease {
            name: name.to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        let affected = self
            .conn()
            .execute(
                "INSERT INTO run_leases (name, holder, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     holder = excluded.holder,
                     acquired_at = excluded.acquired_at,
                     expires_at = excluded.expires_at
                 WHERE run_leases.expires_at < excluded.acquired_at",
                libsql::params![
                    name,
                    holder,
                    fmt_ts(lease.acquired_at),
                    fmt_ts(lease.expires_at)
                ],
            )
            .await?;

        if affected == 0 {
            let current = self.get_lease(name).await?;
            return Err(DatabaseError::LeaseHeld {
                name: name.to_string(),
                holder: current.holder,
                expires_at: fmt_ts(current.expires_at),
            });
        }
        tracing::debug!(name, holder, expires_at = %lease.expires_at, "run lease acquired");
        Ok(lease)
    }

    /// Release the lease if `holder` still owns it. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete fails.
    pub async fn release_lease(&self, name: &str, holder: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .conn()
            .execute(
                "DELETE FROM run_leases WHERE name = ?1 AND holder = ?2",
                [name, holder],
            )
            .await?;
        Ok(removed > 0)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if the lease is not held.
    pub async fn get_lease(&self, name: &str) -> Result<RunLease, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, holder, acquired_at, expires_at FROM run_leases WHERE name = ?1",
                [name],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_lease(&row)
    }
}
