//! Spreadsheet source discovery.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_file_pattern() -> String {
    "WeldingDB_*".to_string()
}

/// Rows scanned from the top of a sheet when looking for the header.
const fn default_header_scan_rows() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Glob matched against file names when the source path is a directory.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file_pattern: default_file_pattern(),
            header_scan_rows: default_header_scan_rows(),
        }
    }
}

impl SourceConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty pattern or a zero scan depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_pattern.trim().is_empty() {
            return Err(ConfigError::invalid(
                "source.file_pattern",
                "must not be empty",
            ));
        }
        if self.header_scan_rows == 0 {
            return Err(ConfigError::invalid(
                "source.header_scan_rows",
                "must be at least 1",
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
        let config = SourceConfig::default();
        assert_eq!(config.file_pattern, "WeldingDB_*");
        assert_eq!(config.header_scan_rows, 5);
    }

    #[test]
    fn zero_scan_rows_is_invalid() {
        let config = SourceConfig {
            header_scan_rows: 0,
            ..SourceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
