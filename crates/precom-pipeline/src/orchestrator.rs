//! Pipeline orchestrator.
//!
//! ```text
//! pending → backing_up → importing → syncing_master → aggregating → cleaning → completed
//!    │           │            │              │               │
//!    └───────────┴────────────┴──────────────┴───────────────┴──→ failed
//! ```
//!
//! One invocation writes exactly one sync log row: inserted `running` at
//! `pending`, linked to its backup once the backup completes, and finalized at
//! the terminal state. The run holds the pipeline lease from `pending` until it
//! finishes, so an overlapping invocation fails fast.

use std::path::Path;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use precom_config::PrecomConfig;
use precom_core::entities::{AggregateStats, SyncCounts};
use precom_core::enums::{RunState, SnapshotTable, SyncStatus, SyncType, Trigger};
use precom_core::ids::PREFIX_RUN;
use precom_db::PrecomDb;
use precom_db::repos::sync_logs::SyncLogFinish;

use crate::aggregation::AggregationEngine;
use crate::backup::BackupManager;
use crate::error::PipelineError;
use crate::importer::{ImportReport, RecordImporter};
use crate::master_sync::{MasterDataSynchronizer, MasterSyncReport};
use crate::retention::{CleanupReport, RetentionCleaner};

/// Thirty days.
const MAX_LEASE_TTL_SECS: u64 = 2_592_000;

/// Caller-controlled switches for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip the snapshot; the sync log then has no backup link.
    pub skip_backup: bool,
    pub skip_cleanup: bool,
    /// Overrides `retention.soft_delete_grace_days` for the cleanup phase.
    pub cleanup_keep_days: Option<i64>,
    pub description: Option<String>,
}

/// The fatal error that ended a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub phase: RunState,
    pub kind: String,
    pub message: String,
}

/// Outcome of one invocation, as recorded in its sync log.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sync_id: String,
    pub backup_id: Option<String>,
    pub state: RunState,
    pub counts: SyncCounts,
    pub failure: Option<RunFailure>,
    pub detail: Value,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Mutable progress of a run.
struct Run {
    state: RunState,
    backup_id: Option<String>,
    import: Option<ImportReport>,
    master: Option<MasterSyncReport>,
    aggregates: Option<AggregateStats>,
    cleanup: Option<CleanupReport>,
    failure: Option<RunFailure>,
}

impl Run {
    const fn new() -> Self {
        Self {
            state: RunState::Pending,
            backup_id: None,
            import: None,
            master: None,
            aggregates: None,
            cleanup: None,
            failure: None,
        }
    }

    fn advance(&mut self, next: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "run state");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: &PipelineError) {
        tracing::warn!(phase = %self.state, kind = err.kind(), error = %err, "run failed");
        self.failure = Some(RunFailure {
            phase: self.state,
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.state = RunState::Failed;
    }

    fn counts(&self) -> SyncCounts {
        self.import.as_ref().map(|r| r.counts).unwrap_or_default()
    }

    fn detail(&self) -> Value {
        let mut detail = json!({
            "phase": self.failure.as_ref().map_or(self.state, |f| f.phase),
            "backup_id": self.backup_id,
        });
        if let Some(failure) = &self.failure {
            detail["error"] = json!(failure);
        }
        if let Some(import) = &self.import {
            detail["import"] = json!({
                "files": import.files,
                "unchanged": import.unchanged,
                "restored": import.restored,
                "row_errors": import.row_errors,
                "date_warnings": import.date_warnings,
            });
        }
        if let Some(master) = &self.master {
            detail["master_sync"] = json!(master.kinds);
        }
        if let Some(aggregates) = &self.aggregates {
            detail["aggregates"] = json!(aggregates);
        }
        if let Some(cleanup) = &self.cleanup {
            detail["cleanup"] = json!(cleanup);
        }
        detail
    }
}

pub struct PipelineOrchestrator<'a> {
    db: &'a PrecomDb,
    config: &'a PrecomConfig,
}

impl<'a> PipelineOrchestrator<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb, config: &'a PrecomConfig) -> Self {
        Self { db, config }
    }

    /// Run backup, import, master sync, aggregation, and cleanup over the
    /// exports at `source`.
    ///
    /// Phase failures do not return `Err`: they end the run in
    /// [`RunState::Failed`] and are described in the report and its sync log.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` only when the sync log itself cannot be written.
    pub async fn run(
        &self,
        source: &Path,
        trigger: Trigger,
        options: &RunOptions,
    ) -> Result<RunReport, PipelineError> {
        let start = Utc::now();
        let log = self
            .db
            .create_sync_log(SyncType::WeldingImport, trigger, start)
            .await?;
        tracing::info!(sync_id = %log.id, trigger = %trigger, source = %source.display(), "run started");

        let mut run = Run::new();
        let lease_name = self.config.pipeline.lease_name.as_str();
        let holder = match self.acquire_lease(lease_name).await {
            Ok(holder) => Some(holder),
            Err(err) => {
                run.fail(&err);
                None
            }
        };

        if holder.is_some()
            && let Err(err) = self.run_phases(&mut run, &log.id, source, trigger, options).await
        {
            run.fail(&err);
        }

        let status = if run.state == RunState::Completed {
            SyncStatus::Completed
        } else {
            SyncStatus::Failed
        };
        let detail = run.detail();
        let finished = self
            .db
            .finish_sync_log(
                &log.id,
                &SyncLogFinish {
                    status,
                    counts: run.counts(),
                    end_time: Utc::now(),
                    detail: detail.clone(),
                    error_message: run.failure.as_ref().map(|f| f.message.clone()),
                },
            )
            .await;

        if let Some(holder) = &holder {
            match self.db.release_lease(lease_name, holder).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(holder = %holder, "run lease was taken over before release"),
                Err(e) => tracing::warn!(holder = %holder, error = %e, "cannot release run lease"),
            }
        }
        let finished = finished?;

        tracing::info!(
            sync_id = %finished.id,
            state = %run.state,
            duration_ms = finished.duration_ms,
            "run finished"
        );
        Ok(RunReport {
            sync_id: finished.id,
            backup_id: run.backup_id.clone(),
            state: run.state,
            counts: finished.counts,
            failure: run.failure.clone(),
            detail,
        })
    }

    async fn acquire_lease(&self, name: &str) -> Result<String, PipelineError> {
        let holder = self.db.generate_id(PREFIX_RUN).await?;
        let secs = self.config.pipeline.lease_ttl_secs.min(MAX_LEASE_TTL_SECS);
        let ttl = Duration::seconds(i64::try_from(secs).unwrap_or_default());
        let lease = self
            .db
            .acquire_lease(name, &holder, Utc::now(), ttl)
            .await?;
        tracing::debug!(holder = %lease.holder, expires_at = %lease.expires_at, "run lease acquired");
        Ok(holder)
    }

    async fn run_phases(
        &self,
        run: &mut Run,
        sync_id: &str,
        source: &Path,
        trigger: Trigger,
        options: &RunOptions,
    ) -> Result<(), PipelineError> {
        if !options.skip_backup {
            run.advance(RunState::BackingUp)?;
            let manager = BackupManager::new(self.db, &self.config.backup);
            let description = options
                .description
                .clone()
                .unwrap_or_else(|| format!("before {trigger} import"));
            let backup = manager
                .create_backup(Trigger::PreImport, &SnapshotTable::ALL, Some(&description))
                .await?;
            self.db
                .link_sync_backup(sync_id, &backup.id)
                .await
                .map_err(|e| PipelineError::Backup(e.to_string()))?;
            run.backup_id = Some(backup.id);
        }

        run.advance(RunState::Importing)?;
        let importer = RecordImporter::new(self.db, &self.config.source);
        run.import = Some(importer.import_records(source, Some(sync_id)).await?);

        run.advance(RunState::SyncingMaster)?;
        let synchronizer = MasterDataSynchronizer::new(self.db);
        run.master = Some(synchronizer.sync_master_data(Some(sync_id)).await?);

        run.advance(RunState::Aggregating)?;
        run.aggregates = Some(AggregationEngine::new(self.db).refresh_aggregates().await?);

        if !options.skip_cleanup {
            run.advance(RunState::Cleaning)?;
            let grace_days = options
                .cleanup_keep_days
                .unwrap_or(self.config.retention.soft_delete_grace_days);
            let cleaner = RetentionCleaner::new(self.db, self.config);
            run.cleanup = Some(cleaner.cleanup(grace_days, Some(sync_id)).await);
        }
        run.advance(RunState::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_rejects_illegal_transition() {
        let mut run = Run::new();
        let err = run.advance(RunState::Aggregating).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(run.state, RunState::Pending);

        run.advance(RunState::Importing).unwrap();
        run.advance(RunState::SyncingMaster).unwrap();
        run.advance(RunState::Aggregating).unwrap();
        run.advance(RunState::Completed).unwrap();
        assert!(run.advance(RunState::Failed).is_err());
    }

    #[test]
    fn failure_records_phase() {
        let mut run = Run::new();
        run.advance(RunState::Importing).unwrap();
        run.fail(&PipelineError::ImportSystemic("source unreadable".into()));

        assert_eq!(run.state, RunState::Failed);
        let detail = run.detail();
        assert_eq!(detail["phase"], "importing");
        assert_eq!(detail["error"]["kind"], "import_systemic_failure");
        assert_eq!(run.counts(), SyncCounts::default());
    }
}
