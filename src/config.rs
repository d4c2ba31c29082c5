// src/config.rs

//! Startup wiring: load the config file, open the store, pick the platform.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::BotConfig;
use crate::services::{ChatPlatform, ConsoleClient, DiscordClient};
use crate::storage::SqliteStore;

/// Load and validate the bot configuration.
pub fn load_config(path: &Path) -> Result<BotConfig> {
    let config = BotConfig::load(path)?;
    log::info!(
        "Loaded configuration from {} ({} search stream(s))",
        path.display(),
        config.search.len()
    );
    Ok(config)
}

/// Open the listing store and make sure its tables exist.
pub async fn open_store(config: &BotConfig) -> Result<SqliteStore> {
    let store = SqliteStore::connect(&config.db_url)?;
    store.init_schema().await?;
    log::debug!("Listing store ready at {}", config.db_url);
    Ok(store)
}

/// The chat platform to post through.
///
/// `dry_run` swaps the REST client for one that only logs what it would send.
pub fn build_platform(config: &BotConfig, dry_run: bool) -> Result<Arc<dyn ChatPlatform>> {
    if dry_run {
        log::info!("Dry run: listings are logged, not posted");
        let channels = config.search.iter().map(|s| s.posting_channel.clone());
        return Ok(Arc::new(ConsoleClient::new(channels)));
    }

    let client = DiscordClient::new(
        &config.token,
        &config.api_base_url,
        config.delivery_timeout(),
    )?;
    Ok(Arc::new(client))
}
