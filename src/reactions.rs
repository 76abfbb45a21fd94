//! Reaction handling utilities

use grammers_tl_types as tl;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A single reaction kind attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Emoji(String),
    CustomEmoji(i64),
    Paid,
    Empty,
}

impl Reaction {
    /// Printable label; `None` for reactions without a symbol.
    pub fn label(&self) -> Option<String> {
        match self {
            Reaction::Emoji(emoticon) => Some(emoticon.clone()),
            Reaction::CustomEmoji(document_id) => Some(format!("CustomEmoji({})", document_id)),
            Reaction::Paid => Some("💎".to_string()),
            Reaction::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionTally {
    pub reaction: Reaction,
    pub count: i32,
}

/// Reactions of a message as reported by Telegram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReactions {
    pub results: Vec<ReactionTally>,
}

impl MessageReactions {
    pub fn new(results: Vec<ReactionTally>) -> Self {
        Self { results }
    }
}

impl From<&tl::enums::MessageReactions> for MessageReactions {
    fn from(reactions: &tl::enums::MessageReactions) -> Self {
        let tl::enums::MessageReactions::Reactions(reactions) = reactions;

        let results = reactions
            .results
            .iter()
            .map(|result| {
                let tl::enums::ReactionCount::Count(count) = result;
                let reaction = match &count.reaction {
                    tl::enums::Reaction::Emoji(emoji) => Reaction::Emoji(emoji.emoticon.clone()),
                    tl::enums::Reaction::CustomEmoji(custom) => {
                        Reaction::CustomEmoji(custom.document_id)
                    }
                    tl::enums::Reaction::Paid => Reaction::Paid,
                    tl::enums::Reaction::Empty => Reaction::Empty,
                };
                ReactionTally {
                    reaction,
                    count: count.count,
                }
            })
            .collect();

        Self { results }
    }
}

/// Per-emoji entry of the exported aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionBreakdown {
    pub emoji: String,
    pub count: i32,
}

/// Exported reaction aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub count: i64,
    pub reactions: Option<Vec<ReactionBreakdown>>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReactionError {
    #[error("negative count {count} for reaction {reaction:?}")]
    NegativeCount { reaction: Reaction, count: i32 },

    #[error("reaction total overflows")]
    Overflow,
}

/// Build the aggregate for a message.
///
/// Absent data and malformed data both yield `None`; this never fails the
/// surrounding record.
pub fn summarize_reactions(reactions: Option<&MessageReactions>) -> Option<ReactionSummary> {
    let reactions = reactions?;
    match try_summarize(reactions) {
        Ok(summary) => Some(summary),
        Err(err) => {
            debug!("Dropping malformed reactions: {}", err);
            None
        }
    }
}

fn try_summarize(reactions: &MessageReactions) -> Result<ReactionSummary, ReactionError> {
    let mut total: i64 = 0;
    let mut breakdown = Vec::with_capacity(reactions.results.len());

    for tally in &reactions.results {
        if tally.count < 0 {
            return Err(ReactionError::NegativeCount {
                reaction: tally.reaction.clone(),
                count: tally.count,
            });
        }
        total = total
            .checked_add(i64::from(tally.count))
            .ok_or(ReactionError::Overflow)?;

        if let Some(emoji) = tally.reaction.label() {
            breakdown.push(ReactionBreakdown {
                emoji,
                count: tally.count,
            });
        }
    }

    Ok(ReactionSummary {
        count: total,
        reactions: Some(breakdown),
    })
}
