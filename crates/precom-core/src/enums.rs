//! Status enums, triggers, change types, and table identifiers for Precom.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`
//! and expose `as_str()` for SQL storage. Status enums with state machines provide
//! `allowed_next_states()` to enforce valid transitions at the application layer.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Provenance tag for a pipeline run or backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Periodic file-sync run started by the scheduler.
    Scheduled,
    /// Backup taken immediately before an import outside a scheduled run.
    PreImport,
    /// Operator-invoked run or backup.
    Manual,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::PreImport => "pre_import",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BackupType
// ---------------------------------------------------------------------------

/// Kind of snapshot recorded in `data_backups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    Full,
    Incremental,
    Manual,
}

impl BackupType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Manual => "manual",
        }
    }

    /// Backup type implied by a trigger: operator backups are `manual`, everything
    /// else is a full snapshot.
    #[must_use]
    pub const fn for_trigger(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Manual => Self::Manual,
            Trigger::Scheduled | Trigger::PreImport => Self::Full,
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BackupStatus
// ---------------------------------------------------------------------------

/// Status of a backup.
///
/// ```text
/// running → completed
///         → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Running,
    Completed,
    Failed,
}

impl BackupStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncStatus
// ---------------------------------------------------------------------------

/// Terminal status recorded on a sync log row.
///
/// ```text
/// running → completed
///         → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncType
// ---------------------------------------------------------------------------

/// What kind of run produced a sync log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Full pipeline run: backup, import, master sync, aggregation, cleanup.
    WeldingImport,
}

impl SyncType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeldingImport => "welding_import",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Pipeline run state machine.
///
/// ```text
/// pending → backing_up → importing → syncing_master → aggregating → cleaning → completed
///         ↘ importing (backup skipped)                            ↘ completed (cleanup skipped)
///
/// failed is reachable from every state before cleaning
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    BackingUp,
    Importing,
    SyncingMaster,
    Aggregating,
    Cleaning,
    Completed,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::BackingUp, Self::Importing, Self::Failed],
            Self::BackingUp => &[Self::Importing, Self::Failed],
            Self::Importing => &[Self::SyncingMaster, Self::Failed],
            Self::SyncingMaster => &[Self::Aggregating, Self::Failed],
            Self::Aggregating => &[Self::Cleaning, Self::Completed, Self::Failed],
            Self::Cleaning => &[Self::Completed],
            Self::Completed | Self::Failed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BackingUp => "backing_up",
            Self::Importing => "importing",
            Self::SyncingMaster => "syncing_master",
            Self::Aggregating => "aggregating",
            Self::Cleaning => "cleaning",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChangeType
// ---------------------------------------------------------------------------

/// Kind of mutation recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
    SoftDelete,
    Restore,
}

impl ChangeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Where a master row's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Derived from the active welding joint records.
    Derived,
    /// Entered by an operator.
    Manual,
}

impl DataSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Derived => "derived",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MasterKind
// ---------------------------------------------------------------------------

/// The three master entities derived from joint records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterKind {
    System,
    Subsystem,
    TestPackage,
}

impl MasterKind {
    pub const ALL: [Self; 3] = [Self::System, Self::Subsystem, Self::TestPackage];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Subsystem => "subsystem",
            Self::TestPackage => "test_package",
        }
    }

    /// SQL table holding rows of this kind.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::System => "systems",
            Self::Subsystem => "subsystems",
            Self::TestPackage => "test_packages",
        }
    }

    /// Snapshot table covering this kind.
    #[must_use]
    pub const fn snapshot_table(self) -> SnapshotTable {
        match self {
            Self::System => SnapshotTable::Systems,
            Self::Subsystem => SnapshotTable::Subsystems,
            Self::TestPackage => SnapshotTable::TestPackages,
        }
    }
}

impl fmt::Display for MasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SnapshotTable
// ---------------------------------------------------------------------------

/// Tables captured by a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTable {
    WeldingJoints,
    TestPackages,
    Systems,
    Subsystems,
}

impl SnapshotTable {
    /// Snapshot order. Restores replay in this order.
    pub const ALL: [Self; 4] = [
        Self::Systems,
        Self::Subsystems,
        Self::TestPackages,
        Self::WeldingJoints,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeldingJoints => "welding_joints",
            Self::TestPackages => "test_packages",
            Self::Systems => "systems",
            Self::Subsystems => "subsystems",
        }
    }

    /// Master kind stored in this table, `None` for the joint table.
    #[must_use]
    pub const fn master_kind(self) -> Option<MasterKind> {
        match self {
            Self::WeldingJoints => None,
            Self::TestPackages => Some(MasterKind::TestPackage),
            Self::Systems => Some(MasterKind::System),
            Self::Subsystems => Some(MasterKind::Subsystem),
        }
    }

    /// Parse a table name as stored in backup manifests.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.as_str() == name)
    }
}

impl fmt::Display for SnapshotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_happy_path_is_allowed() {
        let path = [
            RunState::Pending,
            RunState::BackingUp,
            RunState::Importing,
            RunState::SyncingMaster,
            RunState::Aggregating,
            RunState::Cleaning,
            RunState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn run_state_failed_unreachable_from_cleaning() {
        assert!(!RunState::Cleaning.can_transition_to(RunState::Failed));
        for state in [
            RunState::Pending,
            RunState::BackingUp,
            RunState::Importing,
            RunState::SyncingMaster,
            RunState::Aggregating,
        ] {
            assert!(state.can_transition_to(RunState::Failed), "{state}");
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(RunState::Completed.allowed_next_states().is_empty());
        assert!(RunState::Failed.allowed_next_states().is_empty());
        assert!(!BackupStatus::Completed.can_transition_to(BackupStatus::Failed));
        assert!(!SyncStatus::Failed.can_transition_to(SyncStatus::Completed));
    }

    #[test]
    fn snapshot_table_names_roundtrip() {
        for table in SnapshotTable::ALL {
            assert_eq!(SnapshotTable::from_name(table.as_str()), Some(table));
        }
        assert_eq!(SnapshotTable::from_name("sync_logs"), None);
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_value(ChangeType::SoftDelete).unwrap();
        assert_eq!(json, serde_json::json!("soft_delete"));
        let json = serde_json::to_value(Trigger::PreImport).unwrap();
        assert_eq!(json, serde_json::json!(Trigger::PreImport.as_str()));
    }
}
