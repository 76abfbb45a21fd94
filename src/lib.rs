//! Telegram channel history exporter
//!
//! This library provides tools to:
//! - Page through a channel's history inside a date window
//! - Format posts with views, forwards and reaction summaries
//! - Export each channel to a pretty-printed JSON file
//! - Manage the Telegram session and its connection lifecycle

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod history;
pub mod lifecycle;
pub mod metrics;
pub mod reactions;
pub mod session;
pub mod telegram;

// Re-export common types
pub use config::{Credentials, FileConfig, Settings};
pub use error::{Error, Result};
pub use export::JsonExporter;
pub use format::{MessageRecord, SkippedMessage};
pub use history::{fetch_window, ChannelDirectory, DateWindow, FetchOutcome, HistorySource};
pub use lifecycle::{run_scoped, Completion, Lifecycle};
pub use session::{SessionLock, TelegramClient};
