// src/services/discord.rs

//! Discord REST client.
//!
//! Uses the bot token against the v10 REST API. Presence updates need a
//! gateway session, which this client does not open.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::NotificationPayload;
use crate::services::{BotIdentity, ChannelHandle, ChatPlatform};
use crate::utils::text::truncate;

const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_VALUE_LIMIT: usize = 1024;
const FOOTER_LIMIT: usize = 2048;

/// Text and announcement channels accept messages.
const POSTABLE_CHANNEL_TYPES: [u8; 2] = [0, 5];

const READY_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Discord REST API client.
pub struct DiscordClient {
    http: Client,
    api_base: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    url: String,
    color: u32,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<EmbedMedia>,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedMedia {
    url: String,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

impl Embed {
    fn from_payload(payload: &NotificationPayload) -> Self {
        // Empty field values are rejected by the API.
        let field_value = |v: &str| {
            if v.trim().is_empty() {
                "-".to_string()
            } else {
                truncate(v, FIELD_VALUE_LIMIT)
            }
        };

        Self {
            title: truncate(&payload.title, TITLE_LIMIT),
            description: truncate(&payload.description, DESCRIPTION_LIMIT),
            url: payload.url.clone(),
            color: payload.color,
            fields: payload
                .fields()
                .iter()
                .map(|&(name, value)| EmbedField {
                    name: name.to_string(),
                    value: field_value(value),
                    inline: true,
                })
                .collect(),
            image: payload
                .image_url
                .as_ref()
                .map(|url| EmbedMedia { url: url.clone() }),
            thumbnail: payload
                .thumbnail
                .as_ref()
                .map(|url| EmbedMedia { url: url.clone() }),
            footer: EmbedFooter {
                text: truncate(&payload.footer, FOOTER_LIMIT),
            },
        }
    }
}

impl DiscordClient {
    /// Create a client for `api_base_url` authenticating with `token`.
    pub fn new(token: &str, api_base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = api_base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let http = Client::builder()
            .user_agent(concat!(
                "DiscordBot (listing-bot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: Url::parse(&base)?,
            token: token.trim().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.api_base.join(path.trim_start_matches('/'))?)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .authorized(self.http.get(self.endpoint(path)?))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn current_user(&self) -> Result<User> {
        let response = self
            .authorized(self.http.get(self.endpoint("users/@me")?))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AppError::NotReady("bot token was rejected".to_string()))
            }
            _ => Ok(response.error_for_status()?.json().await?),
        }
    }

    async fn guild_channels(&self, guild: Guild) -> Result<Vec<ChannelHandle>> {
        let channels: Vec<Channel> = self
            .get_json(&format!("guilds/{}/channels", guild.id))
            .await?;

        Ok(channels
            .into_iter()
            .filter(|c| POSTABLE_CHANNEL_TYPES.contains(&c.kind))
            .map(|c| ChannelHandle {
                name: format!("{}/{}", guild.name, c.name.unwrap_or_default()),
                id: c.id,
            })
            .collect())
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn wait_until_ready(&self) -> Result<BotIdentity> {
        loop {
            match self.current_user().await {
                Ok(user) => {
                    return Ok(BotIdentity {
                        id: user.id,
                        name: user.username,
                    });
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    log::warn!(
                        "Discord not reachable yet ({}), retrying in {}s",
                        e,
                        READY_RETRY_DELAY.as_secs()
                    );
                    tokio::time::sleep(READY_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelHandle> {
        let response = self
            .authorized(self.http.get(self.endpoint(&format!("channels/{}", channel_id))?))
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
        ) {
            return Err(AppError::unresolved(channel_id, status));
        }

        let channel: Channel = response.error_for_status()?.json().await?;
        if !POSTABLE_CHANNEL_TYPES.contains(&channel.kind) {
            return Err(AppError::unresolved(
                channel_id,
                format!("channel type {} does not accept messages", channel.kind),
            ));
        }

        Ok(ChannelHandle {
            name: channel.name.unwrap_or_else(|| channel.id.clone()),
            id: channel.id,
        })
    }

    async fn deliver(&self, channel: &ChannelHandle, payload: &NotificationPayload) -> Result<()> {
        let body = CreateMessage {
            embeds: vec![Embed::from_payload(payload)],
        };

        let response = self
            .authorized(
                self.http
                    .post(self.endpoint(&format!("channels/{}/messages", channel.id))?),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::delivery(&channel.id, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(AppError::delivery(
            &channel.id,
            format!("{} {}", status, truncate(detail.trim(), 200)),
        ))
    }

    async fn list_channels(&self) -> Result<Vec<ChannelHandle>> {
        let guilds: Vec<Guild> = self.get_json("users/@me/guilds").await?;
        let per_guild = try_join_all(guilds.into_iter().map(|g| self.guild_channels(g))).await?;
        Ok(per_guild.into_iter().flatten().collect())
    }
}
