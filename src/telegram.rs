//! Telegram side of history fetching: channel resolution and raw pages

use chrono::{DateTime, Utc};
use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use tracing::info;

use crate::error::{Error, Result};
use crate::history::{
    ChannelDirectory, HistoryMessage, HistorySource, MessageContent, PageRequest,
};
use crate::lifecycle::Connection;
use crate::reactions::MessageReactions;
use crate::session::TelegramClient;

/// A channel reference as given by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Public username, without `@`
    Username(String),
    /// Numeric channel id, looked up in the account's dialogs
    Id(i64),
}

impl ChannelRef {
    /// Accepts `@name`, `name`, a bare channel id, or the Bot API form
    /// `-100<id>`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return bare_channel_id(id).map(ChannelRef::Id).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "'{}' is not a channel id; use the channel id or its -100 form",
                    input
                ))
            });
        }

        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "Invalid channel reference '{}'",
                input
            )));
        }
        Ok(ChannelRef::Username(name.to_string()))
    }
}

/// Offset the Bot API adds to channel ids in its `-100<id>` form.
const BOT_API_CHANNEL_OFFSET: i64 = 1_000_000_000_000;

fn bare_channel_id(id: i64) -> Option<i64> {
    if id > 0 {
        Some(id)
    } else if id < -BOT_API_CHANNEL_OFFSET {
        id.checked_neg().map(|id| id - BOT_API_CHANNEL_OFFSET)
    } else {
        None
    }
}

/// Resolve a channel reference to a Peer
pub async fn resolve_channel(client: &Client, reference: &ChannelRef) -> Result<Peer> {
    match reference {
        ChannelRef::Username(username) => client
            .resolve_username(username)
            .await?
            .ok_or_else(|| Error::ChannelNotFound(format!("@{}", username))),
        ChannelRef::Id(target_id) => {
            // By-id lookup only works for channels present in the dialogs
            let mut dialogs = client.iter_dialogs();

            while let Some(dialog) = dialogs.next().await? {
                match &dialog.peer {
                    Peer::Channel(channel) if channel.raw.id == *target_id => {
                        return Ok(Peer::Channel(channel.clone()));
                    }
                    // Megagroups are channels too
                    Peer::Group(group)
                        if matches!(&group.raw, tl::enums::Chat::Channel(c) if c.id == *target_id) =>
                    {
                        return Ok(Peer::Group(group.clone()));
                    }
                    _ => {}
                }
            }

            Err(Error::ChannelNotFound(format!(
                "Channel {} not found in dialogs",
                target_id
            )))
        }
    }
}

/// Get the display name for a peer
pub fn peer_name(peer: &Peer) -> String {
    peer.name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Convert a Peer to InputPeer for API calls.
pub fn peer_to_input(peer: &Peer) -> tl::enums::InputPeer {
    match peer {
        Peer::User(user) => {
            let (user_id, access_hash) = match &user.raw {
                tl::enums::User::User(u) => (u.id, u.access_hash.unwrap_or(0)),
                tl::enums::User::Empty(u) => (u.id, 0),
            };
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id,
                access_hash,
            })
        }
        Peer::Channel(channel) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: channel.raw.id,
            access_hash: channel.raw.access_hash.unwrap_or(0),
        }),
        Peer::Group(group) => match &group.raw {
            tl::enums::Chat::Chat(c) => {
                tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: c.id })
            }
            tl::enums::Chat::Channel(c) => {
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                })
            }
            _ => tl::enums::InputPeer::Empty,
        },
    }
}

/// Unix seconds as reported by Telegram, always UTC.
pub fn telegram_date(timestamp: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(timestamp), 0)
}

/// Map a raw message into a history entry.
pub fn history_message(raw: tl::enums::Message) -> HistoryMessage {
    match raw {
        tl::enums::Message::Message(m) => HistoryMessage {
            id: m.id,
            date: telegram_date(m.date),
            content: MessageContent::Text {
                text: m.message,
                views: m.views,
                forwards: m.forwards,
                reactions: m.reactions.as_ref().map(MessageReactions::from),
            },
        },
        tl::enums::Message::Service(m) => HistoryMessage {
            id: m.id,
            date: telegram_date(m.date),
            content: MessageContent::Service,
        },
        tl::enums::Message::Empty(m) => HistoryMessage::empty(m.id),
    }
}

/// Messages carried by a `messages.getHistory` response.
pub fn page_messages(response: tl::enums::messages::Messages) -> Vec<tl::enums::Message> {
    match response {
        tl::enums::messages::Messages::Messages(m) => m.messages,
        tl::enums::messages::Messages::Slice(m) => m.messages,
        tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
        tl::enums::messages::Messages::NotModified(_) => Vec::new(),
    }
}

/// History of one resolved channel, read with `messages.getHistory`.
pub struct ChannelHistory {
    client: Client,
    peer: tl::enums::InputPeer,
}

impl ChannelHistory {
    pub fn new(client: Client, peer: &Peer) -> Self {
        Self {
            client,
            peer: peer_to_input(peer),
        }
    }
}

impl HistorySource for ChannelHistory {
    async fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<HistoryMessage>> {
        let offset_date = i32::try_from(request.offset_date.timestamp()).map_err(|_| {
            Error::InvalidArgument(format!(
                "Date {} is outside Telegram's range",
                request.offset_date
            ))
        })?;

        let response = self
            .client
            .invoke(&tl::functions::messages::GetHistory {
                peer: self.peer.clone(),
                offset_id: request.offset_id,
                offset_date,
                add_offset: 0,
                limit: i32::try_from(request.limit).unwrap_or(i32::MAX),
                max_id: 0,
                min_id: 0,
                hash: 0,
            })
            .await?;

        Ok(page_messages(response)
            .into_iter()
            .map(history_message)
            .collect())
    }
}

impl ChannelDirectory for TelegramClient {
    type History = ChannelHistory;

    async fn open(&self, channel: &str) -> Result<ChannelHistory> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let reference = ChannelRef::parse(channel)?;
        let peer = resolve_channel(&self.client, &reference).await?;
        info!("Parsing channel: {} ({})", channel, peer_name(&peer));

        Ok(ChannelHistory::new(self.client.clone(), &peer))
    }
}
