//! History retention windows.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_soft_delete_grace_days() -> i64 {
    90
}

const fn default_audit_retention_days() -> Option<i64> {
    Some(90)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Soft-deleted rows older than this are purged.
    #[serde(default = "default_soft_delete_grace_days")]
    pub soft_delete_grace_days: i64,

    /// Change and sync logs older than this are purged. When unset, the grace
    /// window passed to the cleaner is used instead.
    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: Option<i64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            soft_delete_grace_days: default_soft_delete_grace_days(),
            audit_retention_days: default_audit_retention_days(),
        }
    }
}

impl RetentionConfig {
    /// Audit window in days for a cleanup invoked with `grace_days`.
    #[must_use]
    pub fn audit_days_or(&self, grace_days: i64) -> i64 {
        self.audit_retention_days.unwrap_or(grace_days)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for negative windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.soft_delete_grace_days < 0 {
            return Err(ConfigError::invalid(
                "retention.soft_delete_grace_days",
                "must not be negative",
            ));
        }
        if self.audit_retention_days.is_some_and(|days| days < 0) {
            return Err(ConfigError::invalid(
                "retention.audit_retention_days",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = RetentionConfig::default();
        assert_eq!(config.soft_delete_grace_days, 90);
        assert_eq!(config.audit_days_or(7), 90);
    }

    #[test]
    fn audit_window_falls_back_to_grace() {
        let config = RetentionConfig {
            audit_retention_days: None,
            ..RetentionConfig::default()
        };
        assert_eq!(config.audit_days_or(14), 14);
    }
}
