use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DataSource, MasterKind};
use crate::lifecycle::Lifecycle;

/// Descriptive attributes of a master row.
///
/// Systems use only `description`; subsystems add `system_code`; test packages use
/// all three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterAttributes {
    pub system_code: Option<String>,
    pub subsystem_code: Option<String>,
    pub description: Option<String>,
}

impl MasterAttributes {
    /// `(column, value)` pairs stored for `kind`.
    #[must_use]
    pub fn fields(&self, kind: MasterKind) -> Vec<(&'static str, Option<String>)> {
        match kind {
            MasterKind::System => vec![("description", self.description.clone())],
            MasterKind::Subsystem => vec![
                ("system_code", self.system_code.clone()),
                ("description", self.description.clone()),
            ],
            MasterKind::TestPackage => vec![
                ("system_code", self.system_code.clone()),
                ("subsystem_code", self.subsystem_code.clone()),
                ("description", self.description.clone()),
            ],
        }
    }
}

/// A System, Subsystem, or `TestPackage` master row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub kind: MasterKind,
    pub code: String,
    pub attributes: MasterAttributes,
    pub data_source: DataSource,
    pub is_manually_modified: bool,
    pub needs_review: bool,
    pub lifecycle: Lifecycle,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_follow_kind() {
        let attrs = MasterAttributes {
            system_code: Some("S1".into()),
            subsystem_code: Some("S1-A".into()),
            description: Some("TP-1".into()),
        };
        assert_eq!(attrs.fields(MasterKind::System).len(), 1);
        assert_eq!(attrs.fields(MasterKind::Subsystem)[0].0, "system_code");
        assert_eq!(attrs.fields(MasterKind::TestPackage).len(), 3);
    }
}
