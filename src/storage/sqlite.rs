//! SQLite listing store.
//!
//! One connection behind a mutex. Every call hops onto the blocking pool so
//! store access never stalls the poll loop or command handlers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::{AppError, Result};
use crate::models::ListingRecord;
use crate::storage::ListingStore;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const LISTING_COLUMNS: &str = "id, url, price, title, distance, location, posted, \
     shortdescription, lastsearched, searchurlid, imageurl, discovered, new, changes";

/// SQLite-backed listing store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the store named by a connection string.
    ///
    /// Accepts `sqlite://path`, `sqlite:path`, a plain path, or `:memory:`.
    pub fn connect(db_url: &str) -> Result<Self> {
        let target = db_url
            .strip_prefix("sqlite://")
            .or_else(|| db_url.strip_prefix("sqlite:"))
            .unwrap_or(db_url)
            .trim();

        if target.is_empty() {
            return Err(AppError::config("db_url does not name a database"));
        }

        if target == ":memory:" {
            return Self::in_memory();
        }
        Self::open(target)
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create the listing tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = match conn.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut guard)
        })
        .await?
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Text layouts the crawler has been seen to write into DATETIME columns.
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn parse_datetime(value: ValueRef<'_>) -> Option<NaiveDateTime> {
    match value {
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).ok()?.trim();
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.naive_utc()))
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        ValueRef::Integer(secs) => from_epoch(secs),
        ValueRef::Real(secs) => from_epoch(secs as i64),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|d| d.naive_utc())
}

/// Read a DATETIME column, dropping values that do not parse.
fn datetime_column(row: &Row, id: i64, name: &str) -> rusqlite::Result<Option<NaiveDateTime>> {
    let value = row.get_ref(name)?;
    let parsed = parse_datetime(value);
    if parsed.is_none() && !matches!(value, ValueRef::Null) {
        log::warn!("Listing {} has an unreadable {} value, ignoring it", id, name);
    }
    Ok(parsed)
}

fn row_to_listing(row: &Row) -> rusqlite::Result<ListingRecord> {
    let text = |name: &str| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
    };
    let id: i64 = row.get("id")?;

    Ok(ListingRecord {
        id,
        url: text("url")?,
        price: text("price")?,
        title: text("title")?,
        distance: text("distance")?,
        location: text("location")?,
        posted: datetime_column(row, id, "posted")?,
        short_description: text("shortdescription")?,
        image_url: text("imageurl")?,
        discovered: row.get::<_, Option<i64>>("discovered")?.unwrap_or(0),
        new: row.get::<_, Option<bool>>("new")?.unwrap_or(false),
        changes: row.get("changes")?,
        last_searched: datetime_column(row, id, "lastsearched")?,
        search_url_id: row.get::<_, Option<i64>>("searchurlid")?.unwrap_or_default(),
    })
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn fetch_unseen(&self, indices: &[i64], limit: u32) -> Result<Vec<ListingRecord>> {
        if indices.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let indices = indices.to_vec();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS} FROM listings \
                 WHERE new = 1 AND searchurlid IN ({}) \
                 ORDER BY id LIMIT {}",
                placeholders(indices.len()),
                limit
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(indices.iter()), row_to_listing)?;

            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
    }

    async fn mark_delivered(&self, ids: &[i64], searched_at: NaiveDateTime) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut flipped = 0;
            {
                let mut stmt = tx.prepare(
                    "UPDATE listings SET new = 0, lastsearched = ?1 WHERE id = ?2 AND new = 1",
                )?;
                for id in &ids {
                    flipped += stmt.execute(params![searched_at, id])?;
                }
            }
            tx.commit()?;
            Ok(flipped)
        })
        .await
    }

    async fn get_listing(&self, id: i64) -> Result<Option<ListingRecord>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1");
            let listing = conn
                .query_row(&sql, params![id], row_to_listing)
                .optional()?;
            Ok(listing)
        })
        .await
    }

    async fn count_unseen(&self, indices: &[i64]) -> Result<u64> {
        if indices.is_empty() {
            return Ok(0);
        }

        let indices = indices.to_vec();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM listings WHERE new = 1 AND searchurlid IN ({})",
                placeholders(indices.len())
            );
            let count: i64 =
                conn.query_row(&sql, params_from_iter(indices.iter()), |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
