//! Integration tests for telegram_parser library
//!
//! These tests verify the public API and module interactions.

mod commands;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tempfile::tempdir;
use telegram_parser::{
    config::{CliOverrides, FileConfig, Settings, DEFAULT_CONFIG_PATH, SESSION_NAME},
    error::Error,
    export::{load_records, output_path, JsonExporter},
    format::{format_message, format_messages, MessageRecord},
    history::{DateWindow, HistoryMessage},
    reactions::{MessageReactions, Reaction, ReactionTally},
};

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_constants() {
    assert_eq!(DEFAULT_CONFIG_PATH, "config.yaml");
    assert_eq!(SESSION_NAME, "telegram_session");
}

#[test]
fn test_settings_from_yaml_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("config.yaml");
    std::fs::write(
        &path,
        "channels:\n  - \"@test\"\nstart_date: \"2024-01-01\"\nend_date: \"2024-01-31\"\n",
    )
    .expect("write config");

    let file = FileConfig::load(&path).expect("load");
    let settings = Settings::resolve(&CliOverrides::default(), &file).expect("settings");

    assert_eq!(settings.channels, vec!["@test".to_string()]);
    assert_eq!(
        settings.window.start(),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        settings.window.end(),
        Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
    );
    assert_eq!(settings.limit, None);
}

#[test]
fn test_missing_config_file_needs_cli_values() {
    let temp = tempdir().expect("tempdir");
    let file = FileConfig::load(temp.path().join("absent.yaml")).expect("missing is empty");

    let result = Settings::resolve(&CliOverrides::default(), &file);
    assert!(matches!(result, Err(Error::MissingSettings(_))));

    let cli = CliOverrides {
        channels: Some(vec!["@cli".into()]),
        start_date: Some("2024-03-01".into()),
        end_date: Some("2024-03-02".into()),
        ..Default::default()
    };
    let settings = Settings::resolve(&cli, &file).expect("cli settings");
    assert_eq!(settings.channels, vec!["@cli".to_string()]);
}

#[test]
fn test_reversed_window_is_invalid() {
    let cli = CliOverrides {
        channels: Some(vec!["@x".into()]),
        start_date: Some("2024-02-01".into()),
        end_date: Some("2024-01-01".into()),
        ..Default::default()
    };

    let result = Settings::resolve(&cli, &FileConfig::default());
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// ============================================================================
// Format + Export Tests
// ============================================================================

#[test]
fn test_record_json_shape() {
    let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
    let message = HistoryMessage::post(42, date, "Hello")
        .with_counters(Some(1500), Some(12))
        .with_reactions(MessageReactions::new(vec![
            ReactionTally {
                reaction: Reaction::Emoji("👍".into()),
                count: 7,
            },
            ReactionTally {
                reaction: Reaction::Paid,
                count: 3,
            },
        ]));

    let record = format_message(&message).expect("record");
    let json: Value = serde_json::to_value(&record).expect("json");

    assert_eq!(json["id"], 42);
    assert_eq!(json["date"], "2024-01-15T10:30:00+00:00");
    assert_eq!(json["message"], "Hello");
    assert_eq!(json["views"], 1500);
    assert_eq!(json["forwards"], 12);
    assert_eq!(json["reactions"]["count"], 10);
    assert_eq!(json["reactions"]["reactions"][0]["emoji"], "👍");
    assert_eq!(json["reactions"]["reactions"][1]["emoji"], "💎");
}

#[test]
fn test_post_without_counters_exports_nulls() {
    let date = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let record = format_message(&HistoryMessage::post(1, date, "")).expect("record");
    let json: Value = serde_json::to_value(&record).expect("json");

    assert_eq!(json["message"], "");
    assert!(json["views"].is_null());
    assert!(json["forwards"].is_null());
    assert!(json["reactions"].is_null());
}

#[test]
fn test_export_preserves_unicode_and_round_trips() {
    let temp = tempdir().expect("tempdir");
    let exporter = JsonExporter::new(temp.path().join("nested").join("data"));
    let date = Utc.with_ymd_and_hms(2024, 1, 20, 8, 0, 0).unwrap();
    let outcome = format_messages(&[
        HistoryMessage::post(5, date, "Привет 👋 日本語"),
        HistoryMessage::service(4, date),
    ]);

    let path = exporter.save("@unicode", &outcome.records).expect("save");

    assert_eq!(path, output_path(exporter.dir(), "@unicode"));
    let raw = std::fs::read_to_string(&path).expect("read");
    assert!(raw.contains("Привет 👋 日本語"));
    assert!(raw.contains("\n  {"));
    let loaded: Vec<MessageRecord> = load_records(&path).expect("load");
    assert_eq!(loaded, outcome.records);
    assert_eq!(outcome.skipped.len(), 1);
}

#[test]
fn test_window_is_half_open() {
    let window = DateWindow::from_dates(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .expect("window");

    assert!(window.contains(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    assert!(window.contains(Utc.with_ymd_and_hms(2024, 1, 30, 23, 59, 59).unwrap()));
    assert!(!window.contains(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()));
    assert!(!window.contains(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
}
