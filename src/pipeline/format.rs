//! Listing to notification rendering.
//!
//! Turns a stored listing, plus its change log versus the previous crawl,
//! into a [`NotificationPayload`]. Rendering is pure apart from the accent
//! color, which is random unless pinned.

use std::fmt::Write as _;

use rand::Rng;

use crate::error::Result;
use crate::models::{ChangeEntry, ListingRecord, NotificationPayload};
use crate::utils::{escape_image_url, resolve};

const CHANGES_HEADING: &str = "**The following differences from the previous listing were identified**";

/// How the accent color of each payload is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccentColor {
    Random,
    Fixed(u32),
}

/// Renders listings into notification payloads.
#[derive(Debug, Clone)]
pub struct ChangeFormatter {
    listing_base_url: String,
    color: AccentColor,
}

impl ChangeFormatter {
    /// Create a formatter that resolves relative listing urls against
    /// `listing_base_url`.
    pub fn new(listing_base_url: impl Into<String>) -> Self {
        Self {
            listing_base_url: listing_base_url.into(),
            color: AccentColor::Random,
        }
    }

    /// Pin the accent color.
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = AccentColor::Fixed(color & 0xFF_FFFF);
        self
    }

    /// Render a listing including its change summary.
    ///
    /// Fails with `MalformedChangeLog` if the stored change log cannot be
    /// parsed; callers fall back to [`ChangeFormatter::format_undiffed`].
    pub fn format(
        &self,
        record: &ListingRecord,
        thumbnail: Option<&str>,
    ) -> Result<NotificationPayload> {
        let entries = if record.seen_before() {
            record.change_entries()?
        } else {
            Vec::new()
        };
        Ok(self.build(record, render_description(record, &entries), thumbnail))
    }

    /// Render a listing without its change summary.
    pub fn format_undiffed(
        &self,
        record: &ListingRecord,
        thumbnail: Option<&str>,
    ) -> NotificationPayload {
        self.build(record, render_description(record, &[]), thumbnail)
    }

    /// Render a listing, dropping the change summary if it is malformed.
    pub fn format_lenient(
        &self,
        record: &ListingRecord,
        thumbnail: Option<&str>,
    ) -> NotificationPayload {
        self.format(record, thumbnail).unwrap_or_else(|e| {
            log::warn!("{}; posting listing {} without its changes", e, record.id);
            self.format_undiffed(record, thumbnail)
        })
    }

    fn build(
        &self,
        record: &ListingRecord,
        description: String,
        thumbnail: Option<&str>,
    ) -> NotificationPayload {
        let posted = record
            .posted
            .map(|p| p.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        NotificationPayload {
            title: record.title.clone(),
            url: resolve(&self.listing_base_url, &record.url),
            description,
            location: record.location.clone(),
            price: record.price.clone(),
            image_url: Some(record.image_url.trim())
                .filter(|u| !u.is_empty())
                .map(escape_image_url),
            footer: format!("Listed: {}", posted),
            thumbnail: thumbnail.map(str::to_string),
            color: self.pick_color(),
        }
    }

    fn pick_color(&self) -> u32 {
        match self.color {
            AccentColor::Fixed(c) => c,
            AccentColor::Random => rand::thread_rng().gen_range(0..=0xFF_FFFF),
        }
    }
}

/// Description text for a listing given its parsed change entries.
///
/// A listing never seen before gets its short description verbatim.
pub fn render_description(record: &ListingRecord, entries: &[ChangeEntry]) -> String {
    if !record.seen_before() {
        return record.short_description.clone();
    }

    let mut description = format!(
        "{}\n\nThis listing has been found {} time(s) before.\n",
        record.short_description, record.discovered
    );

    if !entries.is_empty() {
        description.push_str(CHANGES_HEADING);
        description.push('\n');
        for entry in entries {
            let _ = writeln!(description, "{}: {}", entry.field, entry.finding);
        }
    }

    description
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::AppError;
    use crate::models::fixtures::listing;

    fn formatter() -> ChangeFormatter {
        ChangeFormatter::new("https://www.kijiji.ca/").with_color(0x336699)
    }

    #[test]
    fn test_first_sighting_uses_short_description_verbatim() {
        let record = listing(1, 5);
        let payload = formatter().format(&record, None).unwrap();
        assert_eq!(payload.description, "Bike for sale");
    }

    #[test]
    fn test_repeat_sighting_lists_changes_in_order() {
        let mut record = listing(2, 5);
        record.short_description = "Couch".into();
        record.discovered = 2;
        record.changes = Some(
            r#"[{"Property":"price","Finding":"dropped to $50"},{"Property":"title","Finding":"added OBO"}]"#
                .into(),
        );

        let payload = formatter().format(&record, None).unwrap();
        assert!(payload.description.starts_with("Couch\n\n"));
        assert!(payload.description.contains("found 2 time(s) before"));
        assert!(payload.description.contains(CHANGES_HEADING));

        let price = payload.description.find("price: dropped to $50").unwrap();
        let title = payload.description.find("title: added OBO").unwrap();
        assert!(price < title);
    }

    #[test]
    fn test_repeat_sighting_without_changes_has_no_heading() {
        let mut record = listing(3, 5);
        record.discovered = 1;

        let payload = formatter().format(&record, None).unwrap();
        assert!(payload.description.contains("found 1 time(s) before"));
        assert!(!payload.description.contains(CHANGES_HEADING));
    }

    #[test]
    fn test_changes_ignored_for_first_sighting() {
        let mut record = listing(4, 5);
        record.changes = Some("not json".into());

        let payload = formatter().format(&record, None).unwrap();
        assert_eq!(payload.description, "Bike for sale");
    }

    #[test]
    fn test_malformed_log_fails_and_lenient_falls_back() {
        let mut record = listing(5, 5);
        record.discovered = 3;
        record.changes = Some("[1, 2]".into());

        let f = formatter();
        assert!(matches!(
            f.format(&record, None),
            Err(AppError::MalformedChangeLog { listing_id: 5, .. })
        ));

        let payload = f.format_lenient(&record, None);
        assert!(payload.description.contains("found 3 time(s) before"));
        assert!(!payload.description.contains(CHANGES_HEADING));
    }

    #[test]
    fn test_payload_fields() {
        let mut record = listing(6, 5);
        record.posted = NaiveDate::from_ymd_opt(2018, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0));

        let payload = formatter()
            .format(&record, Some("https://thumbs.example.com/bike.png"))
            .unwrap();

        assert_eq!(payload.title, "Listing 6");
        assert_eq!(payload.url, "https://www.kijiji.ca/v-bikes/city/listing/6");
        assert_eq!(payload.location, "Ottawa");
        assert_eq!(payload.price, "$100.00");
        assert_eq!(
            payload.image_url.as_deref(),
            Some("https://img.example.com/a%7Eb.jpg")
        );
        assert_eq!(payload.footer, "Listed: 2018-05-01 09:30:00");
        assert_eq!(
            payload.thumbnail.as_deref(),
            Some("https://thumbs.example.com/bike.png")
        );
        assert_eq!(payload.color, 0x336699);
    }

    #[test]
    fn test_description_is_deterministic_apart_from_color() {
        let mut record = listing(7, 5);
        record.discovered = 2;
        record.changes = Some(r#"[{"Property":"price","Finding":"up"}]"#.into());

        let f = ChangeFormatter::new("https://www.kijiji.ca/");
        let a = f.format(&record, None).unwrap();
        let b = f.format(&record, None).unwrap();
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_missing_image_and_post_date() {
        let mut record = listing(8, 5);
        record.image_url = "  ".into();

        let payload = formatter().format(&record, None).unwrap();
        assert!(payload.image_url.is_none());
        assert_eq!(payload.footer, "Listed: unknown");
    }
}
