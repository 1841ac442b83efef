use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::ndt::NdtMethod;

const DIN_TOLERANCE: f64 = 1e-9;

/// Joint and DIN completion of one test package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSummary {
    pub test_package_id: String,
    pub total_joints: u64,
    pub completed_joints: u64,
    pub remaining_joints: u64,
    pub total_din: f64,
    pub completed_din: f64,
    pub remaining_din: f64,
}

impl JointSummary {
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when counts or DIN totals are inconsistent.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |what: &str| {
            Err(CoreError::Validation(format!(
                "joint summary {}: {what}",
                self.test_package_id
            )))
        };
        if self.completed_joints > self.total_joints {
            return fail("completed joints exceed total");
        }
        if self.remaining_joints != self.total_joints - self.completed_joints {
            return fail("remaining joints != total - completed");
        }
        if self.total_din < 0.0 || self.completed_din < 0.0 {
            return fail("negative DIN");
        }
        if self.completed_din > self.total_din + DIN_TOLERANCE {
            return fail("completed DIN exceeds total");
        }
        if (self.remaining_din - (self.total_din - self.completed_din)).abs() > DIN_TOLERANCE {
            return fail("remaining DIN != total - completed");
        }
        Ok(())
    }
}

/// Progress of one NDT method within a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodProgress {
    pub total: u64,
    pub completed: u64,
    pub remaining: u64,
}

impl MethodProgress {
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.completed <= self.total && self.remaining == self.total - self.completed
    }
}

/// Per-method inspection progress of one test package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdePwhtStatus {
    pub test_package_id: String,
    pub methods: BTreeMap<NdtMethod, MethodProgress>,
}

impl NdePwhtStatus {
    #[must_use]
    pub fn progress(&self, method: NdtMethod) -> MethodProgress {
        self.methods.get(&method).copied().unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` naming the first inconsistent method.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (method, progress) in &self.methods {
            if !progress.is_consistent() {
                return Err(CoreError::Validation(format!(
                    "nde status {} {method}: completed {} / total {} / remaining {}",
                    self.test_package_id, progress.completed, progress.total, progress.remaining
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of an aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub packages: u64,
    pub joint_rows: u64,
    pub nde_rows: u64,
    /// Packages that had aggregates before this pass and have none now.
    pub removed_packages: u64,
}
