//! CLI subcommands.

pub mod config_cmd;
pub mod fact;
pub mod prompt;
pub mod status;

use factctx_config::AppConfig;
use factctx_store::{SqliteFactStore, StoreOptions, StoreRegistry};
use std::path::Path;
use std::sync::Arc;

/// Load config, letting `--store` win over file and environment.
pub fn load_config(store: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(path) = store {
        config.store.path = Some(path.display().to_string());
    }
    tracing::debug!(store = %config.store.resolved_path().display(), "Configuration loaded");
    Ok(config)
}

/// Open the configured store through a registry.
pub async fn open_store(
    config: &AppConfig,
) -> Result<Arc<SqliteFactStore>, Box<dyn std::error::Error>> {
    let registry = StoreRegistry::new(StoreOptions::from_config(&config.store));
    let store = registry.open(config.store.resolved_path()).await?;
    Ok(store)
}
