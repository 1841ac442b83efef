//! Entity structs for all Precom domain objects.
//!
//! Each entity maps to a table in the libSQL database (see the precom-db migrations).
//! All structs derive `Serialize` and `Deserialize`; backup snapshots are the serde
//! form of these structs, one per line.

mod aggregate;
mod backup;
mod change_log;
mod joint;
mod master;
mod run_lease;
mod sync_log;

pub use aggregate::{AggregateStats, JointSummary, MethodProgress, NdePwhtStatus};
pub use backup::Backup;
pub use change_log::{ChangeLogEntry, NewChange};
pub use joint::{FieldChange, JointData, JointKey, WELD_ID_SEPARATOR, WeldingJoint};
pub use master::{MasterAttributes, MasterRecord};
pub use run_lease::RunLease;
pub use sync_log::{SyncCounts, SyncLog};
