//! Operator console: reads command lines from stdin.
//!
//! Runs as its own task next to the poll loop, sharing the same context.

use std::io::BufRead;

use tokio::sync::mpsc;

use crate::commands::{BotCommand, CommandReply, dispatch};
use crate::context::BotContext;
use crate::error::Result;

const CONSOLE_AUTHOR: &str = "console";

/// Read commands until stdin closes or shutdown is requested.
pub async fn run_console(ctx: BotContext) -> Result<()> {
    let mut lines = spawn_stdin_reader();
    log::info!(
        "Console ready, type {}help for commands",
        ctx.config.command_prefix
    );

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = ctx.shutdown.cancelled() => break,
        };

        let Some(line) = line else {
            log::debug!("Console input closed");
            break;
        };

        if let Some(command) = BotCommand::parse(&ctx.config.command_prefix, &line) {
            let reply = dispatch(&ctx, CONSOLE_AUTHOR, command).await;
            respond(&ctx, reply).await;
        }
    }

    Ok(())
}

/// Lines from stdin, read on a detached thread.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn respond(ctx: &BotContext, reply: CommandReply) {
    match reply {
        CommandReply::Text(text) => println!("{}", text),
        CommandReply::Listing {
            channel_id,
            payload,
        } => {
            println!("{} | {} | {}", payload.title, payload.price, payload.url);
            println!("{}", payload.description);

            let sent = match ctx.platform.resolve_channel(&channel_id).await {
                Ok(channel) => ctx.platform.deliver(&channel, &payload).await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                log::warn!("Could not post listing to {}: {}", channel_id, e);
                println!("Posting to the channel is unavailable.");
            }
        }
    }
}
