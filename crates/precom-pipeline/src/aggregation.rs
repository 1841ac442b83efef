//! Aggregation engine: per-package summaries rebuilt from the active joints.
//!
//! Every pass recomputes all rows in memory, checks them, then replaces both
//! aggregate tables in one transaction. Rows carry no timestamps, so a pass over
//! unchanged joints writes identical rows.

use std::collections::BTreeMap;

use precom_core::entities::{
    AggregateStats, JointSummary, MethodProgress, NdePwhtStatus, WeldingJoint,
};
use precom_core::ndt::NdtMethod;
use precom_db::PrecomDb;

use crate::error::PipelineError;
use crate::in_transaction;

fn round_din(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Build aggregate rows for every package with at least one active joint, in
/// package order. Inactive joints and joints without a package are ignored.
#[must_use]
pub fn compute_aggregates(joints: &[WeldingJoint]) -> (Vec<JointSummary>, Vec<NdePwhtStatus>) {
    let mut packages: BTreeMap<&str, Vec<&WeldingJoint>> = BTreeMap::new();
    for joint in joints.iter().filter(|j| j.lifecycle.is_active()) {
        if let Some(package) = joint.data.test_package_id.as_deref()
            && !package.is_empty()
        {
            packages.entry(package).or_default().push(joint);
        }
    }

    let mut summaries = Vec::with_capacity(packages.len());
    let mut statuses = Vec::with_capacity(packages.len());
    for (package, members) in packages {
        let total_joints = members.len() as u64;
        let completed_joints = members.iter().filter(|j| j.is_welded()).count() as u64;
        let total_din = round_din(members.iter().filter_map(|j| j.data.size).sum());
        let completed_din = round_din(
            members
                .iter()
                .filter(|j| j.is_welded())
                .filter_map(|j| j.data.size)
                .sum(),
        );
        summaries.push(JointSummary {
            test_package_id: package.to_string(),
            total_joints,
            completed_joints,
            remaining_joints: total_joints - completed_joints,
            total_din,
            completed_din,
            remaining_din: round_din(total_din - completed_din),
        });

        let mut methods = BTreeMap::new();
        for method in NdtMethod::ALL {
            let tracked = members.iter().filter_map(|j| j.data.results.get(method));
            let (total, completed) = tracked.fold((0u64, 0u64), |(total, completed), result| {
                (total + 1, completed + u64::from(result.is_terminal()))
            });
            methods.insert(
                method,
                MethodProgress {
                    total,
                    completed,
                    remaining: total - completed,
                },
            );
        }
        statuses.push(NdePwhtStatus {
            test_package_id: package.to_string(),
            methods,
        });
    }
    (summaries, statuses)
}

pub struct AggregationEngine<'a> {
    db: &'a PrecomDb,
}

impl<'a> AggregationEngine<'a> {
    #[must_use]
    pub const fn new(db: &'a PrecomDb) -> Self {
        Self { db }
    }

    /// Recompute and replace `joint_summaries` and `nde_pwht_status`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::AggregationInconsistency` when a computed row fails
    /// its sanity check (nothing is written), or `PipelineError::Aggregation` when
    /// the database fails.
    pub async fn refresh_aggregates(&self) -> Result<AggregateStats, PipelineError> {
        let db_failure = |e: precom_db::error::DatabaseError| PipelineError::Aggregation(e.to_string());

        let before = self.db.aggregate_package_ids().await.map_err(db_failure)?;
        let joints = self.db.list_active_joints().await.map_err(db_failure)?;
        let (summaries, statuses) = compute_aggregates(&joints);

        for summary in &summaries {
            summary
                .validate()
                .map_err(|e| PipelineError::AggregationInconsistency(e.to_string()))?;
        }
        for status in &statuses {
            status
                .validate()
                .map_err(|e| PipelineError::AggregationInconsistency(e.to_string()))?;
        }

        in_transaction(self.db, self.db.replace_aggregates(&summaries, &statuses))
            .await
            .map_err(db_failure)?;

        let removed_packages = before
            .iter()
            .filter(|id| !summaries.iter().any(|s| &s.test_package_id == *id))
            .count() as u64;
        let stats = AggregateStats {
            packages: summaries.len() as u64,
            joint_rows: summaries.len() as u64,
            nde_rows: statuses.len() as u64,
            removed_packages,
        };
        tracing::info!(
            packages = stats.packages,
            removed = stats.removed_packages,
            "aggregates rebuilt"
        );
        Ok(stats)
    }
}
