// src/pipeline/poll.rs

//! Listing poll loop.
//!
//! ```text
//! Idle -> Scanning(stream) -> Delivering(stream, batch) -> Committing(stream)
//!      -> (next stream) ... -> Sleeping -> Idle
//! ```
//!
//! Each stream's batch is delivered in query order, one record at a time.
//! The first failed delivery ends the batch; only the records sent before it
//! are marked delivered, in a single transaction. Records that were not
//! delivered, or whose commit failed, stay new and are picked up next cycle.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::context::BotContext;
use crate::error::{AppError, Result};
use crate::models::{NotificationPayload, SearchStream};
use crate::pipeline::PollState;
use crate::services::ChannelHandle;

/// Result of one pass over one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    pub stream_id: String,
    /// Listings returned by the scan
    pub fetched: usize,
    /// Listings the platform accepted
    pub delivered: usize,
    /// Listings whose marker flip was committed
    pub committed: usize,
    /// What stopped the pass early, if anything
    pub error: Option<String>,
}

impl StreamOutcome {
    fn new(stream_id: &str) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one full pass over all streams.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub streams: Vec<StreamOutcome>,
    /// Set when shutdown cut the cycle short
    pub interrupted: bool,
}

impl CycleReport {
    pub fn committed(&self) -> usize {
        self.streams.iter().map(|s| s.committed).sum()
    }

    pub fn failures(&self) -> usize {
        self.streams.iter().filter(|s| !s.is_clean()).count()
    }
}

/// Drives poll cycles against the shared context.
pub struct Poller {
    ctx: BotContext,
}

impl Poller {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// Wait for the platform, then poll until shutdown.
    ///
    /// Only a failed readiness wait is returned as an error; everything that
    /// goes wrong inside a cycle is logged and retried next cycle.
    pub async fn run(&self) -> Result<()> {
        let shutdown = self.ctx.shutdown.clone();

        let identity = tokio::select! {
            ready = self.ctx.platform.wait_until_ready() => ready?,
            _ = shutdown.cancelled() => {
                self.ctx.status.set_state(PollState::Stopped);
                return Ok(());
            }
        };
        log::info!("Signed in as {} ({})", identity.name, identity.id);

        match self.ctx.rotate_presence().await {
            Ok(Some(presence)) => log::info!("Presence set to '{}'", presence),
            Ok(None) => {}
            Err(e) => log::warn!("Could not set presence: {}", e),
        }

        log::info!(
            "Polling {} search stream(s) every {}s, up to {} listing(s) each",
            self.ctx.config.search.len(),
            self.ctx.config.poll_interval_secs,
            self.ctx.config.posting_limit
        );

        while !shutdown.is_cancelled() {
            let report = self.run_cycle().await;
            log::info!(
                "Cycle {} finished: {} listing(s) posted, {} stream(s) with errors",
                self.ctx.status.cycles(),
                report.committed(),
                report.failures()
            );

            if report.interrupted {
                break;
            }

            self.ctx.status.set_state(PollState::Sleeping);
            if !self.pause(self.ctx.config.poll_interval()).await {
                break;
            }
        }

        self.ctx.status.set_state(PollState::Stopped);
        log::info!("Poll loop stopped");
        Ok(())
    }

    /// Run one pass over every stream.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let streams = &self.ctx.config.search;

        for (i, stream) in streams.iter().enumerate() {
            if self.ctx.shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }

            report.streams.push(self.run_stream(stream).await);

            let more = i + 1 < streams.len();
            if more && !self.pause(self.ctx.config.stream_delay()).await {
                report.interrupted = true;
                break;
            }
        }

        self.ctx.status.cycle_completed();
        self.ctx.status.set_state(PollState::Idle);
        report
    }

    /// Scan, deliver and commit one stream.
    pub async fn run_stream(&self, stream: &SearchStream) -> StreamOutcome {
        let mut outcome = StreamOutcome::new(&stream.id);
        let label = stream.display_label();

        let channel = match self
            .ctx
            .platform
            .resolve_channel(&stream.posting_channel)
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                log::warn!("[{}] skipping this cycle: {}", label, e);
                outcome.error = Some(e.to_string());
                self.record(&outcome, None);
                return outcome;
            }
        };

        self.ctx.status.set_state(PollState::Scanning {
            stream: stream.id.clone(),
        });

        let batch = match self
            .ctx
            .store
            .fetch_unseen(&stream.search_indices, self.ctx.config.posting_limit)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("[{}] listing query failed: {}", label, e);
                outcome.error = Some(e.to_string());
                self.record(&outcome, None);
                return outcome;
            }
        };

        let searched_at = Utc::now();
        outcome.fetched = batch.len();
        if batch.is_empty() {
            log::debug!("[{}] no new listings", label);
            self.record(&outcome, Some(searched_at));
            return outcome;
        }

        self.ctx.status.set_state(PollState::Delivering {
            stream: stream.id.clone(),
            batch: batch.len(),
        });

        let mut delivered_ids = Vec::with_capacity(batch.len());
        for record in &batch {
            if self.ctx.shutdown.is_cancelled() {
                log::info!(
                    "[{}] shutdown requested, leaving {} listing(s) for later",
                    label,
                    batch.len() - delivered_ids.len()
                );
                break;
            }

            let payload = self
                .ctx
                .formatter
                .format_lenient(record, stream.thumbnail.as_deref());

            match self.deliver(&channel, &payload).await {
                Ok(()) => {
                    log::info!("[{}] posted listing {} to {}", label, record.id, channel);
                    delivered_ids.push(record.id);
                }
                Err(e) => {
                    log::error!(
                        "[{}] delivery of listing {} failed, {} listing(s) left for next cycle: {}",
                        label,
                        record.id,
                        batch.len() - delivered_ids.len(),
                        e
                    );
                    outcome.error = Some(e.to_string());
                    break;
                }
            }
        }
        outcome.delivered = delivered_ids.len();

        if !delivered_ids.is_empty() {
            self.ctx.status.set_state(PollState::Committing {
                stream: stream.id.clone(),
            });

            match self
                .ctx
                .store
                .mark_delivered(&delivered_ids, searched_at.naive_utc())
                .await
            {
                Ok(flipped) => outcome.committed = flipped,
                Err(e) => {
                    log::error!(
                        "[{}] commit failed, {} delivered listing(s) will be posted again: {}",
                        label,
                        delivered_ids.len(),
                        e
                    );
                    outcome.error = Some(e.to_string());
                }
            }
        }

        self.record(&outcome, Some(searched_at));
        outcome
    }

    async fn deliver(&self, channel: &ChannelHandle, payload: &NotificationPayload) -> Result<()> {
        let limit = self.ctx.config.delivery_timeout();
        match tokio::time::timeout(limit, self.ctx.platform.deliver(channel, payload)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::DeliveryTimeout {
                channel: channel.id.clone(),
                secs: limit.as_secs(),
            }),
        }
    }

    fn record(&self, outcome: &StreamOutcome, searched_at: Option<DateTime<Utc>>) {
        self.ctx.status.record_pass(
            &outcome.stream_id,
            searched_at,
            outcome.committed,
            outcome.error.clone(),
        );
    }

    /// Sleep for `duration` unless shutdown comes first. Returns false on
    /// shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.ctx.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.ctx.shutdown.cancelled() => false,
        }
    }
}
