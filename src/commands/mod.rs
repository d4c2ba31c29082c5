//! Interactive chat commands.
//!
//! Commands only read shared state; the poll loop is the single writer of
//! listing markers.

mod console;
mod handlers;

pub use console::run_console;
pub use handlers::{CommandReply, dispatch};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Ping,
    Status,
    /// `None` when the id is missing or not a number
    GetListing(Option<i64>),
    NewPresence,
    Channels,
    Help,
    Shutdown,
    Unknown(String),
}

impl BotCommand {
    /// Parse a chat line. Lines without `prefix` are not commands.
    pub fn parse(prefix: &str, line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_lowercase();

        Some(match name.as_str() {
            "ping" => Self::Ping,
            "status" => Self::Status,
            "getlisting" | "gl" => Self::GetListing(words.next().and_then(|w| w.parse().ok())),
            "newpresence" | "np" => Self::NewPresence,
            "channels" => Self::Channels,
            "help" => Self::Help,
            "shutdown" => Self::Shutdown,
            _ => Self::Unknown(name),
        })
    }
}

/// One-line usage for every command.
pub fn help_text(prefix: &str) -> String {
    [
        ("ping", "check that the bot is running"),
        ("status", "poll progress per search"),
        ("getlisting <id>", "post one listing (alias: gl)"),
        ("newpresence", "switch to another presence (alias: np)"),
        ("channels", "list channels the bot can post to"),
        ("shutdown", "stop the bot"),
    ]
    .iter()
    .map(|(usage, what)| format!("{}{} - {}", prefix, usage, what))
    .collect::<Vec<_>>()
    .join("\n")
}
