//! Conversion of fetched history entries into exported records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::history::{HistoryMessage, MessageContent};
use crate::reactions::{summarize_reactions, ReactionSummary};

/// One exported message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i32,
    #[serde(with = "iso_date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "message")]
    pub text: Option<String>,
    pub views: Option<i32>,
    pub forwards: Option<i32>,
    pub reactions: Option<ReactionSummary>,
}

/// RFC 3339 with an explicit `+00:00` offset.
mod iso_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("service message has no content to export")]
    ServiceMessage,

    #[error("message is empty")]
    EmptyMessage,

    #[error("message has no date")]
    MissingDate,
}

/// A message left out of the export and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMessage {
    pub id: i32,
    pub reason: FormatError,
}

/// Formatted records plus the messages that could not be formatted.
#[derive(Debug, Default)]
pub struct FormatOutcome {
    pub records: Vec<MessageRecord>,
    pub skipped: Vec<SkippedMessage>,
}

pub fn format_message(message: &HistoryMessage) -> Result<MessageRecord, FormatError> {
    let (text, views, forwards, reactions) = match &message.content {
        MessageContent::Text {
            text,
            views,
            forwards,
            reactions,
        } => (text, views, forwards, reactions),
        MessageContent::Service => return Err(FormatError::ServiceMessage),
        MessageContent::Empty => return Err(FormatError::EmptyMessage),
    };
    let date = message.date.ok_or(FormatError::MissingDate)?;

    Ok(MessageRecord {
        id: message.id,
        date,
        text: Some(text.clone()),
        views: *views,
        forwards: *forwards,
        reactions: summarize_reactions(reactions.as_ref()),
    })
}

/// Format every message independently, keeping the input order.
pub fn format_messages(messages: &[HistoryMessage]) -> FormatOutcome {
    let mut outcome = FormatOutcome::default();

    for message in messages {
        match format_message(message) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                warn!("Error processing message {}: {}", message.id, reason);
                outcome.skipped.push(SkippedMessage {
                    id: message.id,
                    reason,
                });
            }
        }
    }

    outcome
}
