//! Command handlers.

use chrono::{DateTime, Utc};

use crate::commands::{BotCommand, help_text};
use crate::context::BotContext;
use crate::models::{NotificationPayload, SearchStream};
use crate::pipeline::StreamStatus;

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Plain text answer to whoever issued the command
    Text(String),
    /// A rendered listing to post in `channel_id`
    Listing {
        channel_id: String,
        payload: NotificationPayload,
    },
}

impl CommandReply {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Run a parsed command. Failures become explanatory text, never errors.
pub async fn dispatch(ctx: &BotContext, author: &str, command: BotCommand) -> CommandReply {
    match command {
        BotCommand::Ping => {
            log::info!("{} has pinged", author);
            CommandReply::text(format!(":eight_spoked_asterisk: I'm here {}", author))
        }
        BotCommand::Status => status(ctx).await,
        BotCommand::GetListing(Some(id)) => get_listing(ctx, id).await,
        BotCommand::GetListing(None) => CommandReply::text(format!(
            "Usage: {}getlisting <listing id>",
            ctx.config.command_prefix
        )),
        BotCommand::NewPresence => new_presence(ctx).await,
        BotCommand::Channels => channels(ctx).await,
        BotCommand::Help => CommandReply::text(help_text(&ctx.config.command_prefix)),
        BotCommand::Shutdown => {
            log::info!("Shutdown requested by {}", author);
            ctx.shutdown.cancel();
            CommandReply::text("Shutting down.")
        }
        BotCommand::Unknown(name) => CommandReply::text(format!(
            "Unknown command '{}'. Try {}help",
            name, ctx.config.command_prefix
        )),
    }
}

async fn status(ctx: &BotContext) -> CommandReply {
    let mut lines = vec![format!(
        "Running since {} (cycle {}, {})",
        fmt_time(ctx.status.started_at()),
        ctx.status.cycles(),
        ctx.status.state()
    )];

    if let Some(presence) = ctx.status.presence() {
        lines.push(format!("Presence: {}", presence));
    }

    for stream in &ctx.config.search {
        let backlog = match ctx.store.count_unseen(&stream.search_indices).await {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("Backlog lookup for {} failed: {}", stream.id, e);
                None
            }
        };
        lines.push(render_stream_status(
            stream,
            ctx.status.stream(&stream.id).as_ref(),
            backlog,
        ));
    }

    CommandReply::Text(lines.join("\n"))
}

/// One status line (plus an error line if any) for a stream.
pub(crate) fn render_stream_status(
    stream: &SearchStream,
    status: Option<&StreamStatus>,
    backlog: Option<u64>,
) -> String {
    let waiting = backlog
        .map(|n| format!("{} waiting", n))
        .unwrap_or_else(|| "backlog unavailable".to_string());

    let Some(status) = status else {
        return format!("• {}: not yet run, {}", stream.display_label(), waiting);
    };

    let searched = status
        .last_searched
        .map(fmt_time)
        .unwrap_or_else(|| "not yet run".to_string());

    let mut line = format!(
        "• {}: last searched {}, {}, posted {} last pass / {} total",
        stream.display_label(),
        searched,
        waiting,
        status.delivered_last_pass,
        status.delivered_total
    );
    if let Some(error) = &status.last_error {
        line.push_str(&format!("\n  last error: {}", error));
    }
    line
}

async fn get_listing(ctx: &BotContext, id: i64) -> CommandReply {
    let record = match ctx.store.get_listing(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return CommandReply::text(format!("No listing with id {}", id)),
        Err(e) => {
            log::error!("Listing lookup for {} failed: {}", id, e);
            return CommandReply::text("Listings are unavailable right now.");
        }
    };

    // Post with the stream that found it, or the first stream.
    let stream = ctx
        .config
        .search
        .iter()
        .find(|s| s.matches(record.search_url_id))
        .or_else(|| ctx.config.search.first());
    let Some(stream) = stream else {
        return CommandReply::text("No search channel is configured.");
    };

    CommandReply::Listing {
        channel_id: stream.posting_channel.clone(),
        payload: ctx
            .formatter
            .format_lenient(&record, stream.thumbnail.as_deref()),
    }
}

async fn new_presence(ctx: &BotContext) -> CommandReply {
    if ctx.config.presence.len() < 2 {
        return CommandReply::text("I only have one presence.");
    }

    match ctx.rotate_presence().await {
        Ok(Some(presence)) => CommandReply::text(format!("Presence changed to '{}'", presence)),
        Ok(None) => CommandReply::text("I only have one presence."),
        Err(e) => {
            log::warn!("Presence change failed: {}", e);
            CommandReply::text("Changing presence is unavailable.")
        }
    }
}

async fn channels(ctx: &BotContext) -> CommandReply {
    match ctx.platform.list_channels().await {
        Ok(list) if list.is_empty() => CommandReply::text("I can't post to any channel."),
        Ok(list) => CommandReply::Text(
            list.iter()
                .map(|c| format!("• {}", c))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => {
            log::warn!("Channel listing failed: {}", e);
            CommandReply::text("The channel list is unavailable.")
        }
    }
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
