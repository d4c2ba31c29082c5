// src/lib.rs

//! Listing notification bot library.
//!
//! Polls a listing store for new listings per search stream, posts them to
//! chat channels and marks them delivered.

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use context::BotContext;
pub use error::{AppError, Result};
