use std::path::Path;

use anyhow::Context;
use precom_config::PrecomConfig;

use crate::cli::GlobalFlags;

pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<PrecomConfig> {
    load_dotenv(flags.config.as_deref())?;
    PrecomConfig::load(flags.config.as_deref()).context("failed to load precom configuration")
}

/// Load the `.env` next to an explicit config file, else the one in the
/// current directory.
fn load_dotenv(config_path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(dir) = config_path.and_then(Path::parent) {
        let env_path = dir.join(".env");
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("failed to load dotenv file at {}", env_path.display()))?;
            return Ok(());
        }
    }

    dotenvy::dotenv().ok();
    Ok(())
}
