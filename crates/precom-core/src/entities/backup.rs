use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enums::{BackupStatus, BackupType, Trigger};

/// A snapshot of the joint and master tables taken before mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub backup_type: BackupType,
    pub trigger: Trigger,
    pub backup_time: DateTime<Utc>,
    pub backup_by: String,
    pub description: Option<String>,
    /// Row count per table at snapshot time.
    pub table_counts: BTreeMap<String, u64>,
    /// Snapshot file per table.
    pub manifest: BTreeMap<String, String>,
    pub size_bytes: u64,
    pub status: BackupStatus,
    pub error_message: Option<String>,
    pub retention_expiry: DateTime<Utc>,
    pub is_retained: bool,
    pub created_at: DateTime<Utc>,
}
