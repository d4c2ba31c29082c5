//! Storage abstractions for the shared listing store.
//!
//! The crawler writes rows into `listings`; the bot only reads them and flips
//! the delivery marker.
//!
//! ## Query contract
//!
//! ```text
//! SELECT * FROM listings WHERE new = 1 AND searchurlid IN (<indices>) ORDER BY id LIMIT <n>
//! UPDATE listings SET new = 0 WHERE id IN (<delivered ids>)
//! ```

pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::ListingRecord;

// Re-export for convenience
pub use sqlite::SqliteStore;

/// Trait for listing store backends.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Fetch undelivered listings whose search url is one of `indices`, in
    /// listing id order, at most `limit` of them.
    async fn fetch_unseen(&self, indices: &[i64], limit: u32) -> Result<Vec<ListingRecord>>;

    /// Mark `ids` delivered and stamp them with `searched_at`.
    ///
    /// All rows change in one transaction or none do. Returns the number of
    /// rows that flipped.
    async fn mark_delivered(&self, ids: &[i64], searched_at: NaiveDateTime) -> Result<usize>;

    /// Look up a single listing.
    async fn get_listing(&self, id: i64) -> Result<Option<ListingRecord>>;

    /// Number of undelivered listings for `indices`.
    async fn count_unseen(&self, indices: &[i64]) -> Result<u64>;
}
