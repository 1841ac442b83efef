use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Subcommand;
use precom_core::enums::SnapshotTable;

use crate::cli::root_commands::TriggerArg;

/// Snapshot management.
#[derive(Clone, Debug, Subcommand)]
pub enum BackupCommands {
    /// Snapshot joints and master data now.
    Create {
        #[arg(long, value_enum, ignore_case = true, default_value = "manual")]
        trigger: TriggerArg,
        #[arg(long)]
        description: Option<String>,
        /// Table to snapshot (repeatable; all tables when omitted).
        #[arg(long = "table", value_parser = parse_table)]
        tables: Vec<SnapshotTable>,
    },
    /// List recent backups, newest first.
    List,
    /// Replace table content with a completed backup.
    Restore {
        id: String,
        /// Table to restore (repeatable; every backed-up table when omitted).
        #[arg(long = "table", value_parser = parse_table)]
        tables: Vec<SnapshotTable>,
    },
    /// Row counts now against a backup, without restoring anything.
    Compare { id: String },
    /// Restore the newest completed backup taken at or before a time.
    RestoreAt {
        /// RFC 3339 timestamp, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD` (UTC).
        #[arg(value_parser = parse_time)]
        at: DateTime<Utc>,
        #[arg(long = "table", value_parser = parse_table)]
        tables: Vec<SnapshotTable>,
    },
    /// Undelete one soft-deleted row and mark it manually maintained.
    RestoreRecord {
        #[arg(long, value_parser = parse_table)]
        table: SnapshotTable,
        /// Weld id for joints, code for master tables.
        id: String,
    },
}

fn parse_table(raw: &str) -> Result<SnapshotTable, String> {
    SnapshotTable::from_name(raw).ok_or_else(|| {
        let known = SnapshotTable::ALL.map(SnapshotTable::as_str).join(", ");
        format!("unknown table '{raw}' (expected one of: {known})")
    })
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(at.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(23, 59, 59))
        .map(|at| at.and_utc())
        .ok_or_else(|| format!("invalid time '{raw}'"))
}
