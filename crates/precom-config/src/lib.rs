//! # precom-config
//!
//! Layered configuration loading for Precom using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`PRECOM_*` prefix, `__` as separator)
//! 2. An explicit file passed with `--config`
//! 3. Project-level `precom.toml`
//! 4. User-level `~/.config/precom/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `PRECOM_DATABASE__PATH` -> `database.path`,
//! `PRECOM_BACKUP__RETENTION_DAYS` -> `backup.retention_days`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use precom_config::PrecomConfig;
//!
//! let config = PrecomConfig::load_with_dotenv(None).expect("config");
//! println!("database: {}", config.database.path);
//! ```

mod backup;
mod database;
mod error;
mod pipeline;
mod retention;
mod source;

pub use backup::BackupConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use pipeline::PipelineConfig;
pub use retention::RetentionConfig;
pub use source::SourceConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "PRECOM_";
const LOCAL_CONFIG_FILE: &str = "precom.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrecomConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl PrecomConfig {
    /// Load configuration from all sources and validate it.
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFile` when `config_path` does not exist,
    /// `ConfigError::Figment` on malformed sources and `ConfigError::InvalidValue`
    /// when a section fails validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path
            && !path.exists()
        {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        let config: Self = Self::figment(config_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env` from the current directory (if any), then [`Self::load`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load(config_path)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError::InvalidValue` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.source.validate()?;
        self.backup.validate()?;
        self.retention.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("precom").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PrecomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.path, "precom.db");
        assert_eq!(config.pipeline.lease_name, "data_sync");
    }

    #[test]
    fn figment_builds_without_files() {
        figment::Jail::expect_with(|_jail| {
            let config: PrecomConfig = PrecomConfig::figment(None).extract()?;
            assert_eq!(config.backup.retention_days, 30);
            assert_eq!(config.source.header_scan_rows, 5);
            Ok(())
        });
    }
}
