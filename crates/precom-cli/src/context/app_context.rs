use anyhow::Context;
use precom_config::PrecomConfig;
use precom_db::PrecomDb;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub db: PrecomDb,
    pub config: PrecomConfig,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn init(config: PrecomConfig) -> anyhow::Result<Self> {
        let db = PrecomDb::open_local(&config.database.path)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        tracing::debug!(path = %config.database.path, "application context ready");
        Ok(Self { db, config })
    }
}
