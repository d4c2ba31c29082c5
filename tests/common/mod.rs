//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use listing_bot::{
    AppError, BotContext, Result,
    models::{BotConfig, ListingRecord, NotificationPayload},
    pipeline::ChangeFormatter,
    services::{BotIdentity, ChannelHandle, ChatPlatform},
    storage::{ListingStore, SqliteStore},
};
use rusqlite::params;

pub const COLOR: u32 = 0x00AA_55;

/// Chat platform double that records deliveries and fails on request.
#[derive(Default)]
pub struct ScriptedPlatform {
    delivered: Mutex<Vec<(String, NotificationPayload)>>,
    presences: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    /// 1-based delivery attempts that fail
    fail_on: HashSet<usize>,
    unresolved: HashSet<String>,
    hang: bool,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on.insert(attempt);
        self
    }

    pub fn without_channel(mut self, channel: &str) -> Self {
        self.unresolved.insert(channel.to_string());
        self
    }

    /// Every delivery waits forever.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn delivered(&self) -> Vec<(String, NotificationPayload)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_titles(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .map(|(_, p)| p.title)
            .collect()
    }

    pub fn presences(&self) -> Vec<String> {
        self.presences.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for ScriptedPlatform {
    async fn wait_until_ready(&self) -> Result<BotIdentity> {
        Ok(BotIdentity {
            id: "42".into(),
            name: "listing-bot".into(),
        })
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelHandle> {
        if self.unresolved.contains(channel_id) {
            return Err(AppError::unresolved(channel_id, "Unknown Channel"));
        }
        Ok(ChannelHandle {
            id: channel_id.to_string(),
            name: format!("deals-{}", channel_id),
        })
    }

    async fn deliver(&self, channel: &ChannelHandle, payload: &NotificationPayload) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail_on.contains(&attempt) {
            return Err(AppError::delivery(&channel.id, "503 Service Unavailable"));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((channel.id.clone(), payload.clone()));
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelHandle>> {
        Ok(vec![ChannelHandle {
            id: "1001".into(),
            name: "deals-1001".into(),
        }])
    }

    async fn set_presence(&self, text: &str) -> Result<()> {
        self.presences.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Config with one stream per `(id, indices, channel)`, no pauses between
/// streams and a one second delivery timeout.
pub fn config(streams: &[(&str, &[i64], &str)], posting_limit: u32) -> BotConfig {
    let search: Vec<_> = streams
        .iter()
        .map(|(id, indices, channel)| {
            serde_json::json!({
                "id": id,
                "search_indices": indices,
                "posting_channel": channel,
            })
        })
        .collect();

    let json = serde_json::json!({
        "token": "test-token",
        "db_url": "sqlite::memory:",
        "search": search,
        "presence": ["hard to get", "out shopping"],
        "posting_limit": posting_limit,
        "poll_interval_secs": 60,
        "stream_delay_secs": 0,
        "delivery_timeout_secs": 1,
    });
    BotConfig::from_json(&json.to_string()).unwrap()
}

pub fn listing(id: i64, search_url_id: i64) -> ListingRecord {
    ListingRecord {
        id,
        url: format!("v-bikes/ottawa/listing/{}", id),
        price: "$100.00".into(),
        title: format!("Listing {}", id),
        distance: String::new(),
        location: "Ottawa".into(),
        posted: None,
        short_description: "Bike for sale".into(),
        image_url: String::new(),
        discovered: 0,
        new: true,
        changes: None,
        last_searched: None,
        search_url_id,
    }
}

pub async fn store_with(records: &[ListingRecord]) -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.init_schema().await.unwrap();
    for record in records {
        let r = record.clone();
        store
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO listings (id, url, price, title, location, shortdescription,
                        searchurlid, imageurl, discovered, new, changes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        r.id,
                        r.url,
                        r.price,
                        r.title,
                        r.location,
                        r.short_description,
                        r.search_url_id,
                        r.image_url,
                        r.discovered,
                        r.new,
                        r.changes
                    ],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }
    store
}

pub fn context(
    config: BotConfig,
    store: &SqliteStore,
    platform: &Arc<ScriptedPlatform>,
) -> BotContext {
    context_with_store(config, Arc::new(store.clone()), platform)
}

pub fn context_with_store(
    config: BotConfig,
    store: Arc<dyn ListingStore>,
    platform: &Arc<ScriptedPlatform>,
) -> BotContext {
    let platform: Arc<dyn ChatPlatform> = platform.clone();
    BotContext::new(config, store, platform)
        .with_formatter(ChangeFormatter::new("https://www.kijiji.ca/").with_color(COLOR))
}

/// Run raw SQL against the store, e.g. to plant triggers or odd rows.
pub async fn execute(store: &SqliteStore, sql: &str) {
    let sql = sql.to_string();
    store
        .with_conn(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
        .unwrap();
}

/// Store whose scans fail for the given search urls.
pub struct BrokenScanStore {
    pub inner: SqliteStore,
    pub broken: Vec<i64>,
}

#[async_trait]
impl ListingStore for BrokenScanStore {
    async fn fetch_unseen(&self, indices: &[i64], limit: u32) -> Result<Vec<ListingRecord>> {
        if indices.iter().any(|i| self.broken.contains(i)) {
            return Err(AppError::Database(rusqlite::Error::InvalidQuery));
        }
        self.inner.fetch_unseen(indices, limit).await
    }

    async fn mark_delivered(&self, ids: &[i64], searched_at: NaiveDateTime) -> Result<usize> {
        self.inner.mark_delivered(ids, searched_at).await
    }

    async fn get_listing(&self, id: i64) -> Result<Option<ListingRecord>> {
        self.inner.get_listing(id).await
    }

    async fn count_unseen(&self, indices: &[i64]) -> Result<u64> {
        self.inner.count_unseen(indices).await
    }
}

/// Whether listing `id` is still waiting to be posted.
pub async fn is_new(store: &SqliteStore, id: i64) -> bool {
    store.get_listing(id).await.unwrap().unwrap().new
}
