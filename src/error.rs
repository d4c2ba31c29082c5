// src/error.rs

//! Unified error handling for the listing bot.

use std::fmt;

use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite query or transaction failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A blocking store task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A listing's stored change log is not a list of property/finding pairs
    #[error("Malformed change log for listing {listing_id}: {message}")]
    MalformedChangeLog { listing_id: i64, message: String },

    /// Channel identifier no longer maps to a reachable destination
    #[error("Unresolved destination {channel}: {reason}")]
    UnresolvedDestination { channel: String, reason: String },

    /// Message send was rejected or failed in transit
    #[error("Delivery to {channel} failed: {message}")]
    Delivery { channel: String, message: String },

    /// Message send did not finish in time
    #[error("Delivery to {channel} timed out after {secs}s")]
    DeliveryTimeout { channel: String, secs: u64 },

    /// Chat session never became ready
    #[error("Chat session not ready: {0}")]
    NotReady(String),

    /// Operation not offered by the active chat platform
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a malformed change log error.
    pub fn malformed_changes(listing_id: i64, message: impl fmt::Display) -> Self {
        Self::MalformedChangeLog {
            listing_id,
            message: message.to_string(),
        }
    }

    /// Create an unresolved destination error.
    pub fn unresolved(channel: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::UnresolvedDestination {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a delivery error with the destination as context.
    pub fn delivery(channel: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            channel: channel.into(),
            message: message.to_string(),
        }
    }

    /// Whether the failure should leave records queued for the next cycle
    /// rather than stop the process.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Delivery { .. }
                | Self::DeliveryTimeout { .. }
                | Self::UnresolvedDestination { .. }
                | Self::Database(_)
                | Self::Join(_)
        )
    }
}
