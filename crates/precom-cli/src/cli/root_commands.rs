use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use precom_core::enums::Trigger;

use crate::cli::subcommands::BackupCommands;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Run backup, import, master sync, aggregation, and cleanup.
    Run(RunArgs),
    /// Snapshot management.
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },
    /// Purge soft-deleted rows, old logs, and unretained backups.
    Cleanup(CleanupArgs),
    /// Rebuild the per-package summary tables.
    Aggregate,
    /// Recent sync runs.
    Status(StatusArgs),
}

/// Who started a run or backup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TriggerArg {
    Scheduled,
    Manual,
}

impl From<TriggerArg> for Trigger {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Scheduled => Self::Scheduled,
            TriggerArg::Manual => Self::Manual,
        }
    }
}

/// Arguments for `precom run`.
#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Export file, or directory holding `WeldingDB_*` exports.
    #[arg(long)]
    pub excel: PathBuf,
    #[arg(long, value_enum, ignore_case = true)]
    pub trigger: TriggerArg,
    /// Description stored on the pre-import backup.
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub skip_backup: bool,
    #[arg(long)]
    pub skip_cleanup: bool,
    /// Grace period in days for soft-deleted rows (overrides config).
    #[arg(long)]
    pub cleanup_keep_days: Option<u32>,
}

/// Arguments for `precom cleanup`.
#[derive(Clone, Debug, Args)]
pub struct CleanupArgs {
    /// Grace period in days for soft-deleted rows (overrides config).
    #[arg(long)]
    pub days: Option<u32>,
    /// Report what a cleanup would remove instead of removing it.
    #[arg(long)]
    pub stats: bool,
}

/// Arguments for `precom status`.
#[derive(Clone, Debug, Args)]
pub struct StatusArgs {
    /// Number of runs to show (overrides --limit).
    #[arg(long)]
    pub last: Option<u32>,
}
