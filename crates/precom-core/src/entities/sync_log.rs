use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{SyncStatus, SyncType, Trigger};

/// Headline counts of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped: u64,
}

/// One row per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: String,
    pub sync_type: SyncType,
    pub trigger: Trigger,
    pub backup_id: Option<String>,
    pub counts: SyncCounts,
    pub status: SyncStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub detail: Option<serde_json::Value>,
    pub error_message: Option<String>,
}
