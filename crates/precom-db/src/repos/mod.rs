//! Repository methods on [`crate::PrecomDb`], one module per table family.

pub mod aggregates;
pub mod backups;
pub mod change_logs;
pub mod joints;
pub mod leases;
pub mod masters;
pub mod sync_logs;
