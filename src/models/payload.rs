//! Platform-neutral notification payload.

use serde::{Deserialize, Serialize};

/// A rendered listing, ready to hand to a chat platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub title: String,

    /// Link target for the title
    pub url: String,

    pub description: String,

    pub location: String,

    pub price: String,

    pub image_url: Option<String>,

    pub footer: String,

    pub thumbnail: Option<String>,

    /// Cosmetic accent color (0xRRGGBB); not part of the payload's meaning
    pub color: u32,
}

impl NotificationPayload {
    /// Inline name/value pairs shown under the description.
    pub fn fields(&self) -> [(&'static str, &str); 2] {
        [("Location", &self.location), ("Price", &self.price)]
    }

    /// Compare everything except the accent color.
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            color: 0,
            ..self.clone()
        } == Self {
            color: 0,
            ..other.clone()
        }
    }
}
