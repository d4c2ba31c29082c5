//! Bot configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SearchStream;

/// Root bot configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chat platform bot token
    pub token: String,

    /// Listing store connection string
    #[serde(alias = "connection_string")]
    pub db_url: String,

    /// Search streams, polled in this order
    pub search: Vec<SearchStream>,

    /// Prefix that marks a chat line as a command
    #[serde(default = "defaults::command_prefix")]
    pub command_prefix: String,

    /// Presence texts the bot rotates through
    #[serde(default = "defaults::presence")]
    pub presence: Vec<String>,

    /// Maximum listings fetched per stream per cycle
    #[serde(default = "defaults::posting_limit")]
    pub posting_limit: u32,

    /// Pause after a full pass over all streams
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Pause between two streams of the same pass
    #[serde(default = "defaults::stream_delay")]
    pub stream_delay_secs: u64,

    /// Upper bound on a single message send
    #[serde(default = "defaults::delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Prefix for listing urls stored relative to the listing site
    #[serde(default = "defaults::listing_base_url")]
    pub listing_base_url: String,

    /// Chat platform REST endpoint
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,
}

impl BotConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(content).map_err(|e| AppError::config(e.to_string()))?;

        config.presence.retain(|p| !p.trim().is_empty());
        if config.presence.is_empty() {
            config.presence = defaults::presence();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::validation("token is empty"));
        }
        if self.db_url.trim().is_empty() {
            return Err(AppError::validation("db_url is empty"));
        }
        if self.search.is_empty() {
            return Err(AppError::validation("At least one search is required"));
        }

        let mut ids = HashSet::new();
        for stream in &self.search {
            if stream.id.trim().is_empty() {
                return Err(AppError::validation("search id is empty"));
            }
            if !ids.insert(stream.id.as_str()) {
                return Err(AppError::validation(format!(
                    "search id '{}' is defined twice",
                    stream.id
                )));
            }
            if stream.search_indices.is_empty() {
                return Err(AppError::validation(format!(
                    "search '{}' has no search indices",
                    stream.id
                )));
            }
            if stream.posting_channel.is_empty() {
                return Err(AppError::validation(format!(
                    "search '{}' has no posting channel",
                    stream.id
                )));
            }
            if !stream.posting_channel.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AppError::validation(format!(
                    "search '{}' posting channel '{}' is not a numeric channel id",
                    stream.id, stream.posting_channel
                )));
            }
        }

        if self.command_prefix.is_empty() {
            return Err(AppError::validation("command_prefix is empty"));
        }
        if self.posting_limit == 0 {
            return Err(AppError::validation("posting_limit must be > 0"));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(AppError::validation("delivery_timeout_secs must be > 0"));
        }
        url::Url::parse(&self.listing_base_url)?;
        url::Url::parse(&self.api_base_url)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stream_delay(&self) -> Duration {
        Duration::from_secs(self.stream_delay_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Human-readable summary with the token masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let chars: Vec<char> = self.token.chars().collect();
        let masked = match chars.len() {
            0..=8 => "********".to_string(),
            n => format!(
                "{}…{}",
                chars[..4].iter().collect::<String>(),
                chars[n - 4..].iter().collect::<String>()
            ),
        };
        vec![
            ("Token", masked),
            ("Store", self.db_url.clone()),
            ("Command prefix", self.command_prefix.clone()),
            ("Presence", self.presence.join(", ")),
            ("Posting limit", self.posting_limit.to_string()),
            (
                "Intervals",
                format!(
                    "cycle {}s, stream {}s, delivery timeout {}s",
                    self.poll_interval_secs, self.stream_delay_secs, self.delivery_timeout_secs
                ),
            ),
            (
                "Searches",
                self.search
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        ]
    }
}

mod defaults {
    pub fn command_prefix() -> String {
        "#".into()
    }
    pub fn presence() -> Vec<String> {
        vec!["hard to get".into()]
    }
    pub fn posting_limit() -> u32 {
        3
    }
    pub fn poll_interval() -> u64 {
        60
    }
    pub fn stream_delay() -> u64 {
        1
    }
    pub fn delivery_timeout() -> u64 {
        10
    }
    pub fn listing_base_url() -> String {
        "https://www.kijiji.ca/".into()
    }
    pub fn api_base_url() -> String {
        "https://discord.com/api/v10".into()
    }
}
