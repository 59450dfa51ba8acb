//! Per-channel conversation history for Corvid.
//!
//! All state is in-memory and lost on restart; persistence is explicitly
//! not this system's job.

pub mod history;

pub use history::{ChannelHistoryStore, ChannelStats, CleanupReport, GlobalStats};
