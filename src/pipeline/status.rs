//! Shared poll loop status.
//!
//! Written by the poll loop, read by command handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Where the poll loop currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Not started, or between cycles before the first scan
    Idle,
    /// Querying the store for a stream's unseen listings
    Scanning { stream: String },
    /// Sending a stream's batch
    Delivering { stream: String, batch: usize },
    /// Flipping the delivered listings' markers
    Committing { stream: String },
    /// Waiting out the cycle period
    Sleeping,
    /// Shut down
    Stopped,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::Scanning { stream } => write!(f, "scanning {}", stream),
            PollState::Delivering { stream, batch } => {
                write!(f, "delivering {} listing(s) for {}", batch, stream)
            }
            PollState::Committing { stream } => write!(f, "committing {}", stream),
            PollState::Sleeping => write!(f, "sleeping"),
            PollState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-stream results of the most recent pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStatus {
    /// When the stream was last scanned successfully
    pub last_searched: Option<DateTime<Utc>>,
    /// Listings delivered and committed in the last pass
    pub delivered_last_pass: usize,
    /// Listings delivered and committed since startup
    pub delivered_total: u64,
    /// Error from the last pass, cleared by a clean pass
    pub last_error: Option<String>,
}

/// Process-wide status, shared between the poll loop and commands.
#[derive(Debug)]
pub struct StatusBoard {
    started_at: DateTime<Utc>,
    state: RwLock<PollState>,
    streams: RwLock<HashMap<String, StreamStatus>>,
    presence: RwLock<Option<String>>,
    cycles: AtomicU64,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            state: RwLock::new(PollState::Idle),
            streams: RwLock::new(HashMap::new()),
            presence: RwLock::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> PollState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or(PollState::Idle)
    }

    pub fn set_state(&self, state: PollState) {
        log::debug!("poll state -> {}", state);
        if let Ok(mut slot) = self.state.write() {
            *slot = state;
        }
    }

    /// Status of one stream; `None` until its first pass.
    pub fn stream(&self, stream_id: &str) -> Option<StreamStatus> {
        self.streams
            .read()
            .ok()
            .and_then(|m| m.get(stream_id).cloned())
    }

    /// Record a finished pass over a stream.
    pub fn record_pass(
        &self,
        stream_id: &str,
        searched_at: Option<DateTime<Utc>>,
        committed: usize,
        error: Option<String>,
    ) {
        if let Ok(mut map) = self.streams.write() {
            let entry = map.entry(stream_id.to_string()).or_default();
            if searched_at.is_some() {
                entry.last_searched = searched_at;
            }
            entry.delivered_last_pass = committed;
            entry.delivered_total += committed as u64;
            entry.last_error = error;
        }
    }

    pub fn presence(&self) -> Option<String> {
        self.presence.read().ok().and_then(|p| p.clone())
    }

    pub fn set_presence(&self, text: &str) {
        if let Ok(mut slot) = self.presence.write() {
            *slot = Some(text.to_string());
        }
    }

    pub fn cycle_completed(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}
