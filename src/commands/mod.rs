//! Command implementations
//!
//! Each module backs one binary.

pub mod init_session;
pub mod parse;

pub use parse::{export_channel, export_channels, ChannelReport, ChannelSummary, RunReport};
