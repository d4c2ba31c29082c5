// src/context.rs

//! Shared bot context.
//!
//! Built once at startup and handed to the poll loop and the command
//! handlers; everything inside is either immutable or synchronized.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::BotConfig;
use crate::pipeline::{ChangeFormatter, StatusBoard};
use crate::services::ChatPlatform;
use crate::storage::ListingStore;

/// Everything the poll loop and command handlers share.
#[derive(Clone)]
pub struct BotContext {
    pub config: Arc<BotConfig>,
    pub store: Arc<dyn ListingStore>,
    pub platform: Arc<dyn ChatPlatform>,
    pub formatter: ChangeFormatter,
    pub status: Arc<StatusBoard>,
    pub shutdown: CancellationToken,
}

impl BotContext {
    pub fn new(
        config: BotConfig,
        store: Arc<dyn ListingStore>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        let formatter = ChangeFormatter::new(config.listing_base_url.clone());
        Self {
            config: Arc::new(config),
            store,
            platform,
            formatter,
            status: Arc::new(StatusBoard::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the formatter, e.g. to pin the accent color.
    pub fn with_formatter(mut self, formatter: ChangeFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Pick a configured presence other than `exclude`, if there is one.
    pub fn random_presence(&self, exclude: Option<&str>) -> Option<String> {
        let choices: Vec<&String> = self
            .config
            .presence
            .iter()
            .filter(|p| Some(p.as_str()) != exclude)
            .collect();
        choices
            .choose(&mut rand::thread_rng())
            .map(|p| p.to_string())
    }

    /// Switch to a random presence different from the current one.
    ///
    /// Returns the new presence, or `None` when there is nothing else to
    /// switch to.
    pub async fn rotate_presence(&self) -> Result<Option<String>> {
        let current = self.status.presence();
        let Some(next) = self.random_presence(current.as_deref()) else {
            return Ok(None);
        };

        self.platform.set_presence(&next).await?;
        self.status.set_presence(&next);
        Ok(Some(next))
    }
}
