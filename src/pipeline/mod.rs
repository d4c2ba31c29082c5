//! Listing pipeline.
//!
//! - `ChangeFormatter`: render a listing and its changes into a payload
//! - `Poller`: the periodic scan / deliver / commit loop
//! - `StatusBoard`: poll progress shared with command handlers

pub mod format;
pub mod poll;
pub mod status;

pub use format::{AccentColor, ChangeFormatter, render_description};
pub use poll::{CycleReport, Poller, StreamOutcome};
pub use status::{PollState, StatusBoard, StreamStatus};
