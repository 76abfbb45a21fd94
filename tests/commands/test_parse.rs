//! End-to-end runs of the parse command over in-memory channels

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;
use telegram_parser::{
    commands::export_channels,
    config::{CliOverrides, FileConfig, Settings},
    error::{Error, Result},
    export::{load_records, JsonExporter},
    history::{ChannelDirectory, HistoryMessage, HistorySource, PageRequest},
};

/// A channel history held in memory, newest first.
struct MemoryHistory {
    messages: Vec<HistoryMessage>,
    /// Whether the server side honours `offset_date`.
    honour_offset_date: bool,
    fail_on_page: Option<usize>,
    pages: usize,
}

impl HistorySource for MemoryHistory {
    async fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<HistoryMessage>> {
        if self.fail_on_page == Some(self.pages) {
            return Err(Error::TelegramError("RPC_CALL_FAIL".into()));
        }
        self.pages += 1;

        let honour = self.honour_offset_date;
        Ok(self
            .messages
            .iter()
            .filter(|m| request.offset_id == 0 || m.id < request.offset_id)
            .filter(|m| !honour || m.date.is_some_and(|d| d < request.offset_date))
            .take(request.limit)
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
struct ChannelFixture {
    messages: Vec<HistoryMessage>,
    honour_offset_date: bool,
    fail_on_page: Option<usize>,
}

#[derive(Default)]
struct MemoryDirectory {
    channels: HashMap<String, ChannelFixture>,
    opened: AtomicUsize,
}

impl MemoryDirectory {
    fn add(&mut self, name: &str, messages: Vec<HistoryMessage>) -> &mut ChannelFixture {
        self.channels.entry(name.to_string()).or_insert(ChannelFixture {
            messages,
            honour_offset_date: true,
            fail_on_page: None,
        })
    }
}

impl ChannelDirectory for MemoryDirectory {
    type History = MemoryHistory;

    async fn open(&self, channel: &str) -> Result<MemoryHistory> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let fixture = self
            .channels
            .get(channel)
            .cloned()
            .ok_or_else(|| Error::ChannelNotFound(channel.to_string()))?;
        Ok(MemoryHistory {
            messages: fixture.messages,
            honour_offset_date: fixture.honour_offset_date,
            fail_on_page: fixture.fail_on_page,
            pages: 0,
        })
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn january_settings(output_dir: &std::path::Path) -> Settings {
    let file = FileConfig::parse(
        "channels:\n  - \"@test\"\nstart_date: \"2024-01-01\"\nend_date: \"2024-01-31\"\n",
    )
    .expect("yaml");
    let cli = CliOverrides {
        output_dir: Some(output_dir.to_path_buf()),
        ..Default::default()
    };
    Settings::resolve(&cli, &file).expect("settings")
}

async fn run(directory: &MemoryDirectory, settings: &Settings) -> telegram_parser::commands::RunReport {
    let exporter = JsonExporter::new(&settings.output_dir);
    export_channels(
        directory,
        &settings.channels,
        &settings.window,
        settings.limit,
        &exporter,
    )
    .await
}

fn boundary_messages() -> Vec<HistoryMessage> {
    vec![
        HistoryMessage::post(3, at(2024, 2, 1), "after"),
        HistoryMessage::post(2, at(2024, 1, 15), "inside").with_counters(Some(10), Some(1)),
        HistoryMessage::post(1, at(2023, 12, 31), "before"),
    ]
}

#[tokio::test]
async fn test_exports_only_messages_inside_window() {
    let temp = tempdir().expect("tempdir");
    let settings = january_settings(temp.path());
    let mut directory = MemoryDirectory::default();
    directory.add("@test", boundary_messages());

    let report = run(&directory, &settings).await;

    assert_eq!(report.succeeded(), 1);
    let records = load_records(&temp.path().join("test_messages.json")).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 2);
    assert_eq!(records[0].text.as_deref(), Some("inside"));
    assert_eq!(records[0].date, at(2024, 1, 15));
}

#[tokio::test]
async fn test_upper_bound_enforced_when_server_ignores_offset_date() {
    let temp = tempdir().expect("tempdir");
    let settings = january_settings(temp.path());
    let mut directory = MemoryDirectory::default();
    directory.add("@test", boundary_messages()).honour_offset_date = false;

    run(&directory, &settings).await;

    let records = load_records(&temp.path().join("test_messages.json")).expect("records");
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_failed_channel_does_not_block_the_next() {
    let temp = tempdir().expect("tempdir");
    let mut settings = january_settings(temp.path());
    settings.channels = vec!["@gone".into(), "@test".into()];
    let mut directory = MemoryDirectory::default();
    directory.add("@test", boundary_messages());

    let report = run(&directory, &settings).await;

    assert_eq!(directory.opened.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.channels[0].channel, "@gone");
    assert!(matches!(
        report.channels[0].result,
        Err(Error::ChannelNotFound(_))
    ));
    assert!(temp.path().join("test_messages.json").exists());
}

#[tokio::test]
async fn test_page_failure_keeps_earlier_pages() {
    let temp = tempdir().expect("tempdir");
    let settings = january_settings(temp.path());
    let messages: Vec<HistoryMessage> = (1..=230)
        .rev()
        .map(|id| HistoryMessage::post(id, at(2024, 1, 2 + (id as u32 % 28)), "post"))
        .collect();
    let mut directory = MemoryDirectory::default();
    directory.add("@test", messages).fail_on_page = Some(2);

    let report = run(&directory, &settings).await;

    let summary = report.channels[0].result.as_ref().expect("partial export");
    assert!(summary.fetch_aborted);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.exported, 200);
    let records = load_records(&summary.path).expect("records");
    assert_eq!(records.first().map(|r| r.id), Some(230));
    assert_eq!(records.last().map(|r| r.id), Some(31));
}

#[tokio::test]
async fn test_service_messages_are_skipped_not_fatal() {
    let temp = tempdir().expect("tempdir");
    let settings = january_settings(temp.path());
    let mut directory = MemoryDirectory::default();
    directory.add(
        "@test",
        vec![
            HistoryMessage::post(4, at(2024, 1, 20), "kept"),
            HistoryMessage::service(3, at(2024, 1, 19)),
            HistoryMessage::post(2, at(2024, 1, 18), "kept"),
        ],
    );

    let report = run(&directory, &settings).await;

    let summary = report.channels[0].result.as_ref().expect("export");
    assert_eq!(summary.exported, 2);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_limit_from_cli_caps_each_channel() {
    let temp = tempdir().expect("tempdir");
    let mut settings = january_settings(temp.path());
    settings.limit = Some(5);
    let messages: Vec<HistoryMessage> = (1..=20)
        .rev()
        .map(|id| HistoryMessage::post(id, at(2024, 1, id as u32), "post"))
        .collect();
    let mut directory = MemoryDirectory::default();
    directory.add("@test", messages);

    let report = run(&directory, &settings).await;

    let summary = report.channels[0].result.as_ref().expect("export");
    assert_eq!(summary.exported, 5);
    let ids: Vec<i32> = load_records(&summary.path)
        .expect("records")
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![20, 19, 18, 17, 16]);
}

#[tokio::test]
async fn test_limit_counts_exported_records_not_service_messages() {
    let temp = tempdir().expect("tempdir");
    let mut settings = january_settings(temp.path());
    settings.limit = Some(3);
    let messages: Vec<HistoryMessage> = (1..=10)
        .rev()
        .map(|id| {
            if id % 2 == 0 {
                HistoryMessage::service(id, at(2024, 1, id as u32))
            } else {
                HistoryMessage::post(id, at(2024, 1, id as u32), "post")
            }
        })
        .collect();
    let mut directory = MemoryDirectory::default();
    directory.add("@test", messages);

    let report = run(&directory, &settings).await;

    let summary = report.channels[0].result.as_ref().expect("export");
    assert_eq!(summary.exported, 3);
    assert_eq!(summary.skipped, 3);
    let ids: Vec<i32> = load_records(&summary.path)
        .expect("records")
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![9, 7, 5]);
}
