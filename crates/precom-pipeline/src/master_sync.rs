//! Master data synchronizer.
//!
//! Systems, subsystems, and test packages are derived from the active joints.
//! Rows flagged `is_manually_modified` belong to operators: the sync only
//! refreshes their `last_sync_time`, and when their code vanishes they are
//! flagged `needs_review` instead of being deleted. The flag clears once the
//! code is derived from active joints again.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use precom_core::entities::{MasterAttributes, MasterRecord, NewChange};
use precom_core::enums::{ChangeType, DataSource, MasterKind};
use precom_core::lifecycle::Lifecycle;
use precom_db::PrecomDb;

use crate::error::PipelineError;
use crate::{SYNC_ACTOR, in_transaction};

const MASTER_SOURCE: &str = "master_sync";

/// Per-kind outcome of a master sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MasterCounts {
    pub added: u64,
    pub updated: u64,
    pub restored: u64,
    pub deleted: u64,
    pub flagged_for_review: u64,
    pub unchanged: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MasterSyncReport {
    pub kinds: BTreeMap<MasterKind, MasterCounts>,
}

impl MasterSyncReport {
    #[must_use]
    pub fn counts(&self, kind: MasterKind) -> MasterCounts {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }
}

pub struct MasterDataSynchronizer<'a> {
    db: &'a PrecomDb,
}

impl<'a> MasterDataSynchronizer<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb) -> Self {
        Self { db }
    }

    /// Bring every master table in line with the active joints, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MasterSync` on any database failure; nothing is
    /// written in that case.
    pub async fn sync_master_data(
        &self,
        sync_id: Option<&str>,
    ) -> Result<MasterSyncReport, PipelineError> {
        let now = Utc::now();
        let report = in_transaction(self.db, async {
            let mut report = MasterSyncReport::default();
            for kind in MasterKind::ALL {
                let counts = self.sync_kind(kind, sync_id, now).await?;
                report.kinds.insert(kind, counts);
            }
            Ok::<_, PipelineError>(report)
        })
        .await
        .map_err(|e| match e {
            PipelineError::MasterSync(_) => e,
            other => PipelineError::MasterSync(other.to_string()),
        })?;

        for (kind, counts) in &report.kinds {
            tracing::info!(
                kind = %kind,
                added = counts.added,
                updated = counts.updated,
                restored = counts.restored,
                deleted = counts.deleted,
                flagged = counts.flagged_for_review,
                "master data synced"
            );
        }
        Ok(report)
    }

    async fn sync_kind(
        &self,
        kind: MasterKind,
        sync_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<MasterCounts, PipelineError> {
        let derived = self.db.derived_masters(kind).await?;
        let existing: HashMap<String, MasterRecord> = self
            .db
            .list_masters(kind)
            .await?
            .into_iter()
            .map(|r| (r.code.clone(), r))
            .collect();
        let mut counts = MasterCounts::default();
        let change = |code: &str, change_type| {
            NewChange::new(kind.table_name(), code, change_type)
                .sync(sync_id)
                .by(SYNC_ACTOR, MASTER_SOURCE)
        };

        for (code, attributes) in &derived {
            let Some(stored) = existing.get(code) else {
                let record = MasterRecord {
                    kind,
                    code: code.clone(),
                    attributes: attributes.clone(),
                    data_source: DataSource::Derived,
                    is_manually_modified: false,
                    needs_review: false,
                    lifecycle: Lifecycle::Active,
                    last_sync_time: Some(now),
                    created_at: now,
                    updated_at: now,
                };
                self.db.insert_master(&record).await?;
                self.db
                    .append_change(&change(code, ChangeType::Insert), now)
                    .await?;
                counts.added += 1;
                continue;
            };

            if stored.is_manually_modified {
                if stored.needs_review {
                    let mut record = stored.clone();
                    record.needs_review = false;
                    record.last_sync_time = Some(now);
                    self.db.update_master(&record).await?;
                    tracing::info!(
                        kind = %kind,
                        code = %code,
                        "manual master row has joints again, review flag cleared"
                    );
                } else {
                    self.db.touch_master_sync(kind, code, now).await?;
                }
                counts.unchanged += 1;
                continue;
            }

            let diffs = field_diffs(kind, &stored.attributes, attributes);
            let restored = stored.lifecycle.restore();
            if diffs.is_empty() && restored.is_none() {
                self.db.touch_master_sync(kind, code, now).await?;
                counts.unchanged += 1;
                continue;
            }

            let mut record = stored.clone();
            record.attributes = attributes.clone();
            record.lifecycle = restored.unwrap_or(stored.lifecycle);
            record.last_sync_time = Some(now);
            record.updated_at = now;
            self.db.update_master(&record).await?;

            if restored.is_some() {
                let entry = change(code, ChangeType::Restore).field(
                    "is_deleted",
                    Some("true".into()),
                    Some("false".into()),
                );
                self.db.append_change(&entry, now).await?;
                counts.restored += 1;
            } else {
                counts.updated += 1;
            }
            for (field, old_value, new_value) in diffs {
                let entry = change(code, ChangeType::Update).field(field, old_value, new_value);
                self.db.append_change(&entry, now).await?;
            }
        }

        for stored in existing.values() {
            if derived.contains_key(&stored.code) || !stored.lifecycle.is_active() {
                continue;
            }
            let mut record = stored.clone();
            record.last_sync_time = Some(now);

            if stored.is_manually_modified {
                if stored.needs_review {
                    self.db.touch_master_sync(kind, &stored.code, now).await?;
                    continue;
                }
                record.needs_review = true;
                self.db.update_master(&record).await?;
                counts.flagged_for_review += 1;
                tracing::warn!(kind = %kind, code = %stored.code, "manual master row lost its joints, flagged for review");
                continue;
            }

            let Some(deleted) = stored.lifecycle.soft_delete(now) else {
                continue;
            };
            record.lifecycle = deleted;
            record.updated_at = now;
            self.db.update_master(&record).await?;
            let entry = change(&stored.code, ChangeType::SoftDelete).field(
                "is_deleted",
                Some("false".into()),
                Some("true".into()),
            );
            self.db.append_change(&entry, now).await?;
            counts.deleted += 1;
        }
        Ok(counts)
    }
}

fn field_diffs(
    kind: MasterKind,
    stored: &MasterAttributes,
    derived: &MasterAttributes,
) -> Vec<(&'static str, Option<String>, Option<String>)> {
    stored
        .fields(kind)
        .into_iter()
        .zip(derived.fields(kind))
        .filter(|((_, old), (_, new))| old != new)
        .map(|((field, old), (_, new))| (field, old, new))
        .collect()
}
