//! Error types for precom-pipeline.
//!
//! Fatal errors are [`PipelineError`] variants and end a run as `failed`.
//! Recovered problems ([`RowError`], [`CleanupWarning`], [`DateWarning`]) are
//! data: they are collected into the run's sync log detail.

use std::path::PathBuf;

use precom_core::enums::RunState;
use precom_db::error::DatabaseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reading the spreadsheet source. All of them are systemic.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read workbook {}: {source}", path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Cannot read CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No source files matching '{pattern}' in {}", path.display())]
    NoFiles { path: PathBuf, pattern: String },

    #[error("Invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("{file}: no header row with drawing number and weld joint columns in the first {scanned} rows")]
    MissingHeader { file: String, scanned: usize },
}

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Import failed: {0}")]
    ImportSystemic(String),

    #[error("Master data sync failed: {0}")]
    MasterSync(String),

    #[error("Aggregates failed consistency check: {0}")]
    AggregationInconsistency(String),

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("Another run holds lease '{name}' ({holder}, until {expires_at})")]
    LeaseHeld {
        name: String,
        holder: String,
        expires_at: String,
    },

    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for PipelineError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::LeaseHeld {
                name,
                holder,
                expires_at,
            } => Self::LeaseHeld {
                name,
                holder,
                expires_at,
            },
            other => Self::Database(other),
        }
    }
}

impl PipelineError {
    /// Stable identifier recorded in the sync log detail.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Backup(_) => "backup_failure",
            Self::ImportSystemic(_) => "import_systemic_failure",
            Self::MasterSync(_) => "master_sync_failure",
            Self::AggregationInconsistency(_) => "aggregation_inconsistency",
            Self::Aggregation(_) => "aggregation_failure",
            Self::Restore(_) => "restore_failure",
            Self::LeaseHeld { .. } => "lease_held",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Database(_) => "database_error",
        }
    }
}

/// A source row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub file: String,
    /// 1-based row number within the sheet.
    pub row: usize,
    /// Natural key when it could be read.
    pub key: Option<String>,
    pub reason: String,
}

/// A date cell that did not parse. The field is imported as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWarning {
    pub file: String,
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// A cleanup sub-step that failed without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupWarning {
    pub step: String,
    pub message: String,
}
