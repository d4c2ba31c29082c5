//! Search stream definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A configured filter + destination channel pairing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchStream {
    /// Stable identifier, unique within the configuration
    pub id: String,

    /// Source indices whose listings this stream posts
    #[serde(alias = "search_indecies")]
    pub search_indices: Vec<i64>,

    /// Destination channel identifier on the chat platform
    #[serde(deserialize_with = "channel_id")]
    pub posting_channel: String,

    /// Thumbnail shown on every notification from this stream
    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Display label, falls back to the id
    #[serde(default)]
    pub label: Option<String>,
}

impl SearchStream {
    /// Name used in logs and status output.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Whether a listing found by `search_url_id` belongs to this stream.
    pub fn matches(&self, search_url_id: i64) -> bool {
        self.search_indices.contains(&search_url_id)
    }
}

impl fmt::Display for SearchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<String> = self.search_indices.iter().map(|i| i.to_string()).collect();
        write!(
            f,
            "{} [indices: {}] -> #{}",
            self.display_label(),
            indices.join(", "),
            self.posting_channel
        )
    }
}

/// Channel ids are snowflakes; config files carry them as strings or numbers.
fn channel_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Number(n) => n.to_string(),
    })
}
