//! Dry-run platform that logs notifications instead of sending them.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::NotificationPayload;
use crate::services::{BotIdentity, ChannelHandle, ChatPlatform};

/// Platform stand-in for local runs: every configured channel resolves and
/// every delivery is written to the log.
pub struct ConsoleClient {
    channels: Vec<String>,
    presence: Mutex<Option<String>>,
}

impl ConsoleClient {
    pub fn new(channels: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let channels = channels
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Self {
            channels,
            presence: Mutex::new(None),
        }
    }

    /// Presence text most recently set.
    pub fn presence(&self) -> Option<String> {
        self.presence.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl ChatPlatform for ConsoleClient {
    async fn wait_until_ready(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            id: "0".into(),
            name: "console".into(),
        })
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelHandle> {
        if channel_id.trim().is_empty() {
            return Err(AppError::unresolved(channel_id, "empty channel id"));
        }
        Ok(ChannelHandle {
            id: channel_id.to_string(),
            name: channel_id.to_string(),
        })
    }

    async fn deliver(&self, channel: &ChannelHandle, payload: &NotificationPayload) -> Result<()> {
        log::info!(
            "[dry-run] {} <- {} | {} | {} | {}",
            channel,
            payload.title,
            payload.price,
            payload.location,
            payload.url
        );
        for line in payload.description.lines().filter(|l| !l.trim().is_empty()) {
            log::info!("[dry-run]     {}", line);
        }
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelHandle>> {
        let mut handles = Vec::with_capacity(self.channels.len());
        for id in &self.channels {
            handles.push(self.resolve_channel(id).await?);
        }
        Ok(handles)
    }

    async fn set_presence(&self, text: &str) -> Result<()> {
        let mut slot = self
            .presence
            .lock()
            .map_err(|_| AppError::Unsupported("presence state is poisoned".into()))?;
        *slot = Some(text.to_string());
        log::info!("[dry-run] presence set to '{}'", text);
        Ok(())
    }
}
