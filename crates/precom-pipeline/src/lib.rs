//! # precom-pipeline
//!
//! The phases of a Precom data sync run and the orchestrator that sequences them:
//!
//! 1. [`backup::BackupManager`] snapshots joints and master data to JSON Lines.
//! 2. [`importer::RecordImporter`] reconciles spreadsheet exports into `welding_joints`.
//! 3. [`master_sync::MasterDataSynchronizer`] derives systems, subsystems, and test
//!    packages from the active joints.
//! 4. [`aggregation::AggregationEngine`] rebuilds the per-package summary tables.
//! 5. [`retention::RetentionCleaner`] purges history past its retention window.
//!
//! [`orchestrator::PipelineOrchestrator`] runs them in that order under a run
//! lease and records one sync log row per invocation. Each mutating phase commits
//! its own transaction.

pub mod aggregation;
pub mod backup;
pub mod error;
pub mod importer;
pub mod master_sync;
pub mod orchestrator;
pub mod retention;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;

use precom_db::PrecomDb;
use precom_db::error::DatabaseError;

pub use error::{CleanupWarning, DateWarning, PipelineError, RowError, SourceError};

/// Actor recorded on change log rows written by sync phases.
pub const SYNC_ACTOR: &str = "sync";

/// Run `work` inside one `BEGIN IMMEDIATE` transaction on `db`.
///
/// Commits when `work` succeeds and rolls back otherwise. A failed rollback is
/// logged; the original error is returned.
pub(crate) async fn in_transaction<T, E, F>(db: &PrecomDb, work: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DatabaseError>,
{
    db.begin().await?;
    let outcome = match work.await {
        Ok(value) => db.commit().await.map(|()| value).map_err(E::from),
        Err(err) => Err(err),
    };
    if outcome.is_err()
        && let Err(rollback_err) = db.rollback().await
    {
        tracing::warn!(error = %rollback_err, "rollback failed");
    }
    outcome
}
