use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::Lifecycle;
use crate::ndt::{NdtMethod, NdtResults};

/// Separator between drawing number and weld joint in a stored `weld_id`.
///
/// Drawing numbers may contain it; weld joints may not, so distinct keys never
/// share an id.
pub const WELD_ID_SEPARATOR: char = '/';

/// Natural key of a joint: drawing number plus joint designator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointKey {
    pub drawing_number: String,
    pub weld_joint: String,
}

impl JointKey {
    #[must_use]
    pub fn new(drawing_number: impl Into<String>, weld_joint: impl Into<String>) -> Self {
        Self {
            drawing_number: drawing_number.into(),
            weld_joint: weld_joint.into(),
        }
    }

    /// Stored identifier, `"{drawing}/{joint}"`.
    #[must_use]
    pub fn weld_id(&self) -> String {
        self.to_string()
    }

    /// Whether [`Self::weld_id`] maps back to exactly this key.
    #[must_use]
    pub fn has_unambiguous_id(&self) -> bool {
        !self.weld_joint.contains(WELD_ID_SEPARATOR)
    }
}

impl fmt::Display for JointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{WELD_ID_SEPARATOR}{}", self.drawing_number, self.weld_joint)
    }
}

/// The source-owned portion of a joint: everything the export file determines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointData {
    pub drawing_number: String,
    pub weld_joint: String,
    pub page_number: Option<String>,
    pub pipeline_number: Option<String>,
    pub revision: Option<String>,
    pub contractor: Option<String>,
    pub system_code: String,
    pub subsystem_code: String,
    pub test_package_id: Option<String>,
    pub weld_date: Option<NaiveDate>,
    /// Diameter-inch.
    pub size: Option<f64>,
    pub results: NdtResults,
}

/// One differing field between a stored joint and its source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl JointData {
    #[must_use]
    pub fn key(&self) -> JointKey {
        JointKey::new(&self.drawing_number, &self.weld_joint)
    }

    /// Fields as `(column, rendered value)` pairs, in column order. Key columns are
    /// excluded since they never change for a matched row.
    #[must_use]
    pub fn rendered_fields(&self) -> Vec<(&'static str, Option<String>)> {
        let mut fields = vec![
            ("page_number", self.page_number.clone()),
            ("pipeline_number", self.pipeline_number.clone()),
            ("revision", self.revision.clone()),
            ("contractor", self.contractor.clone()),
            ("system_code", Some(self.system_code.clone())),
            ("subsystem_code", Some(self.subsystem_code.clone())),
            ("test_package_id", self.test_package_id.clone()),
            (
                "weld_date",
                self.weld_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ),
            ("size", self.size.map(|s| s.to_string())),
        ];
        for method in NdtMethod::ALL {
            fields.push((
                method.result_column(),
                self.results.get(method).map(|r| r.as_str().to_string()),
            ));
        }
        fields
    }

    /// Field-level differences from `self` (stored) to `incoming` (source).
    #[must_use]
    pub fn diff(&self, incoming: &Self) -> Vec<FieldChange> {
        self.rendered_fields()
            .into_iter()
            .zip(incoming.rendered_fields())
            .filter(|((_, old), (_, new))| old != new)
            .map(|((field, old_value), (_, new_value))| FieldChange {
                field,
                old_value,
                new_value,
            })
            .collect()
    }
}

/// A stored welding joint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeldingJoint {
    pub weld_id: String,
    #[serde(flatten)]
    pub data: JointData,
    pub is_manually_modified: bool,
    pub lifecycle: Lifecycle,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeldingJoint {
    /// A weld date is recorded, or every recorded inspection accepted.
    #[must_use]
    pub fn is_welded(&self) -> bool {
        self.data.weld_date.is_some() || self.data.results.all_recorded_accepted()
    }
}
