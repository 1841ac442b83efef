//! Database location.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_path() -> String {
    "precom.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Local libSQL database file. `:memory:` is accepted for throwaway runs.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the path is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::invalid("database.path", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, "precom.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_path_is_invalid() {
        let config = DatabaseConfig { path: "  ".into() };
        assert!(config.validate().is_err());
    }
}
