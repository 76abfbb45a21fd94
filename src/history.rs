//! Paginated history fetching bounded by a date window
//!
//! Pages backwards through a channel's history, newest first. The upper bound
//! is delegated to the source through `offset_date`; the lower bound is
//! checked locally, and paging stops once a page reaches past `start`. The
//! page that straddles `start` is always scanned in full before stopping.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reactions::MessageReactions;

/// Maximum number of messages requested per page.
pub const PAGE_SIZE: usize = 100;

/// Half-open UTC window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidArgument(format!(
                "start ({}) must be earlier than end ({})",
                start.format("%Y-%m-%d %H:%M:%S"),
                end.format("%Y-%m-%d %H:%M:%S")
            )));
        }
        if i32::try_from(end.timestamp()).is_err() {
            return Err(Error::InvalidArgument(format!(
                "end ({}) is past the latest date Telegram can page from",
                end.format("%Y-%m-%d")
            )));
        }
        Ok(Self { start, end })
    }

    /// Window from calendar dates, both taken at UTC midnight.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(midnight_utc(start), midnight_utc(end))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.start <= date && date < self.end
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Payload of a history entry as returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Regular post.
    Text {
        text: String,
        views: Option<i32>,
        forwards: Option<i32>,
        reactions: Option<MessageReactions>,
    },
    /// Service message (pin, title change, ...).
    Service,
    /// Deleted or inaccessible message.
    Empty,
}

/// One entry of a history page.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMessage {
    pub id: i32,
    /// Empty messages carry no date.
    pub date: Option<DateTime<Utc>>,
    pub content: MessageContent,
}

impl HistoryMessage {
    pub fn post(id: i32, date: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            id,
            date: Some(date),
            content: MessageContent::Text {
                text: text.into(),
                views: None,
                forwards: None,
                reactions: None,
            },
        }
    }

    pub fn service(id: i32, date: DateTime<Utc>) -> Self {
        Self {
            id,
            date: Some(date),
            content: MessageContent::Service,
        }
    }

    /// Whether the message becomes an exported record.
    pub fn is_exportable(&self) -> bool {
        self.date.is_some() && matches!(self.content, MessageContent::Text { .. })
    }

    pub fn empty(id: i32) -> Self {
        Self {
            id,
            date: None,
            content: MessageContent::Empty,
        }
    }

    /// Set view/forward counters on a regular post.
    pub fn with_counters(mut self, views: Option<i32>, forwards: Option<i32>) -> Self {
        if let MessageContent::Text {
            views: ref mut v,
            forwards: ref mut f,
            ..
        } = self.content
        {
            *v = views;
            *f = forwards;
        }
        self
    }

    pub fn with_reactions(mut self, reactions: MessageReactions) -> Self {
        if let MessageContent::Text {
            reactions: ref mut r,
            ..
        } = self.content
        {
            *r = Some(reactions);
        }
        self
    }
}

/// Parameters of a single page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Return messages older than this id; 0 means from the newest.
    pub offset_id: i32,
    /// Return messages sent before this instant.
    pub offset_date: DateTime<Utc>,
    pub limit: usize,
}

/// A channel history that can be read page by page, newest first.
#[allow(async_fn_in_trait)]
pub trait HistorySource {
    async fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<HistoryMessage>>;
}

/// Resolves channel references into readable histories.
#[allow(async_fn_in_trait)]
pub trait ChannelDirectory {
    type History: HistorySource;

    async fn open(&self, channel: &str) -> Result<Self::History>;
}

/// Result of paging through a window.
///
/// A failed page does not discard what was accumulated before it; the failure
/// is kept in `aborted` next to the partial messages.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub messages: Vec<HistoryMessage>,
    pub pages: usize,
    pub aborted: Option<Error>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Page through `source` and collect every message inside `window`.
///
/// `limit` caps the number of exportable messages collected; service and
/// empty entries do not count toward it. `None` or `Some(0)` means
/// no cap.
pub async fn fetch_window<S: HistorySource>(
    source: &mut S,
    window: &DateWindow,
    limit: Option<usize>,
) -> FetchOutcome {
    let limit = limit.filter(|&l| l > 0);
    let mut outcome = FetchOutcome::default();
    let mut offset_id = 0;

    loop {
        let request = PageRequest {
            offset_id,
            offset_date: window.end(),
            limit: PAGE_SIZE,
        };

        let page = match source.fetch_page(&request).await {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    offset_id,
                    collected = outcome.messages.len(),
                    "Error fetching messages: {}",
                    err
                );
                outcome.aborted = Some(err);
                break;
            }
        };
        outcome.pages += 1;

        let Some(last) = page.last() else {
            debug!(offset_id, "History exhausted");
            break;
        };
        let next_offset = last.id;
        let oldest = page.iter().rev().find_map(|message| message.date);

        if offset_id != 0 && next_offset >= offset_id {
            warn!(
                offset_id,
                next_offset, "History page did not move the offset backwards, stopping"
            );
            break;
        }

        let before = outcome.messages.len();
        outcome.messages.extend(
            page.into_iter()
                .filter(|message| message.date.is_some_and(|date| window.contains(date))),
        );
        debug!(
            page = outcome.pages,
            offset_id,
            kept = outcome.messages.len() - before,
            "Fetched history page"
        );
        offset_id = next_offset;

        if let Some(limit) = limit {
            if let Some(cut) = limit_cut(&outcome.messages, limit) {
                outcome.messages.truncate(cut);
                info!(limit, "Message limit reached");
                break;
            }
        }

        if oldest.is_some_and(|date| date < window.start()) {
            break;
        }
    }

    outcome
}

/// Length to keep so that exactly `limit` exportable messages remain, or
/// `None` while fewer than `limit` have been collected.
fn limit_cut(messages: &[HistoryMessage], limit: usize) -> Option<usize> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, message)| message.is_exportable())
        .nth(limit - 1)
        .map(|(index, _)| index + 1)
}
