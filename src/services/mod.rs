//! Chat platform layer for the listing bot.
//!
//! This module contains the seam between the bot and a chat service:
//! - Readiness and identity (`ChatPlatform::wait_until_ready`)
//! - Destination lookup (`ChatPlatform::resolve_channel`)
//! - Notification delivery (`ChatPlatform::deliver`)
//! - Discord REST implementation (`DiscordClient`)
//! - Dry-run implementation that only logs (`ConsoleClient`)

mod console;
mod discord;

use std::fmt;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::NotificationPayload;

pub use console::ConsoleClient;
pub use discord::DiscordClient;

/// A destination the platform confirmed it can post to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: String,
    pub name: String,
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.name, self.id)
    }
}

/// The account the bot is signed in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
}

/// Operations the bot needs from a chat platform.
///
/// Delivery failures come back as `Err`, never as panics, so the poll loop
/// can keep going.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Wait until the session can send messages.
    async fn wait_until_ready(&self) -> Result<BotIdentity>;

    /// Translate a configured channel id into a live destination.
    async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelHandle>;

    /// Send one notification.
    async fn deliver(&self, channel: &ChannelHandle, payload: &NotificationPayload) -> Result<()>;

    /// Enumerate destinations the bot can post to.
    async fn list_channels(&self) -> Result<Vec<ChannelHandle>>;

    /// Change the status text shown next to the bot.
    async fn set_presence(&self, text: &str) -> Result<()> {
        Err(AppError::Unsupported(format!(
            "cannot set presence to '{}' on this platform",
            text
        )))
    }
}
