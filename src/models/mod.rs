// src/models/mod.rs

//! Domain models for the listing bot.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod payload;
mod search;

// Re-export all public types
pub use config::BotConfig;
pub use listing::{ChangeEntry, ListingRecord};
pub use payload::NotificationPayload;
pub use search::SearchStream;

#[cfg(test)]
pub(crate) use listing::fixtures;
