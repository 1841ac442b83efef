use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::ChangeType;

/// An append-only audit row.
///
/// `sync_id` is nulled when the owning sync log is purged; the entry itself survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: i64,
    pub sync_id: Option<String>,
    pub table_name: String,
    pub record_id: String,
    pub change_type: ChangeType,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub source: String,
    pub changed_at: DateTime<Utc>,
}

/// A change about to be appended. The id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChange {
    pub sync_id: Option<String>,
    pub table_name: String,
    pub record_id: String,
    pub change_type: ChangeType,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub source: String,
}

impl NewChange {
    #[must_use]
    pub fn new(
        table_name: impl Into<String>,
        record_id: impl Into<String>,
        change_type: ChangeType,
    ) -> Self {
        Self {
            sync_id: None,
            table_name: table_name.into(),
            record_id: record_id.into(),
            change_type,
            field_name: None,
            old_value: None,
            new_value: None,
            actor: String::new(),
            source: String::new(),
        }
    }

    #[must_use]
    pub fn sync(mut self, sync_id: Option<&str>) -> Self {
        self.sync_id = sync_id.map(str::to_string);
        self
    }

    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field_name = Some(name.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    #[must_use]
    pub fn by(mut self, actor: impl Into<String>, source: impl Into<String>) -> Self {
        self.actor = actor.into();
        self.source = source.into();
        self
    }
}
