//! Backup storage and retention.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_dir() -> String {
    "backups".to_string()
}

const fn default_retention_days() -> i64 {
    30
}

/// Newest completed backups that are never marked for deletion.
const fn default_min_keep() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    /// Root directory; snapshots land in `{dir}/{trigger}/`.
    #[serde(default = "default_dir")]
    pub dir: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_min_keep")]
    pub min_keep: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            retention_days: default_retention_days(),
            min_keep: default_min_keep(),
        }
    }
}

impl BackupConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty directory or a non-positive
    /// retention window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dir.trim().is_empty() {
            return Err(ConfigError::invalid("backup.dir", "must not be empty"));
        }
        if self.retention_days <= 0 {
            return Err(ConfigError::invalid(
                "backup.retention_days",
                format!("must be positive, got {}", self.retention_days),
            ));
        }
        Ok(())
    }
}
