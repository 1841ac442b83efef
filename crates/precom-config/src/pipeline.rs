//! Pipeline run lease.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Six hours.
const fn default_lease_ttl_secs() -> u64 {
    21_600
}

fn default_lease_name() -> String {
    "data_sync".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    #[serde(default = "default_lease_name")]
    pub lease_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
            lease_name: default_lease_name(),
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero TTL or an empty lease name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "pipeline.lease_ttl_secs",
                "must be positive",
            ));
        }
        if self.lease_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "pipeline.lease_name",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
