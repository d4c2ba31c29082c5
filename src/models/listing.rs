//! Listing record as stored by the crawler.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One classified-ad listing and its discovery metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    /// Listing id from the source platform
    pub id: i64,

    /// Listing url, absolute or relative to the listing site
    pub url: String,

    pub price: String,

    pub title: String,

    pub distance: String,

    pub location: String,

    /// When the seller posted the ad
    pub posted: Option<NaiveDateTime>,

    pub short_description: String,

    pub image_url: String,

    /// How many earlier crawl passes saw this id
    pub discovered: i64,

    /// True until the listing has been delivered to chat
    pub new: bool,

    /// Serialized change log versus the previous crawl
    pub changes: Option<String>,

    pub last_searched: Option<NaiveDateTime>,

    /// Source index of the search url that found this listing
    pub search_url_id: i64,
}

/// One field-level difference versus the previously crawled version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEntry {
    #[serde(rename = "Property", alias = "property", alias = "field")]
    pub field: String,

    #[serde(
        rename = "Finding",
        alias = "Findings",
        alias = "finding",
        alias = "findings"
    )]
    pub finding: String,
}

impl ListingRecord {
    /// Parse the stored change log.
    ///
    /// A missing or blank log is an empty list. Anything else must be a JSON
    /// array of property/finding pairs.
    pub fn change_entries(&self) -> Result<Vec<ChangeEntry>> {
        let raw = match self.changes.as_deref().map(str::trim) {
            None | Some("") => return Ok(Vec::new()),
            Some(raw) => raw,
        };

        serde_json::from_str::<Vec<ChangeEntry>>(raw)
            .map_err(|e| AppError::malformed_changes(self.id, e))
    }

    /// Whether an earlier crawl pass already saw this listing.
    pub fn seen_before(&self) -> bool {
        self.discovered > 0
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn listing(id: i64, search_url_id: i64) -> ListingRecord {
        ListingRecord {
            id,
            url: format!("v-bikes/city/listing/{}", id),
            price: "$100.00".into(),
            title: format!("Listing {}", id),
            distance: "".into(),
            location: "Ottawa".into(),
            posted: None,
            short_description: "Bike for sale".into(),
            image_url: "https://img.example.com/a~b.jpg".into(),
            discovered: 0,
            new: true,
            changes: None,
            last_searched: None,
            search_url_id,
        }
    }
}
