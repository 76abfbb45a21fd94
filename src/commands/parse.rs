//! Parse command: export the configured channels one after another

use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::export::JsonExporter;
use crate::format::format_messages;
use crate::history::{fetch_window, ChannelDirectory, DateWindow};
use crate::metrics;

/// What was written for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub path: PathBuf,
    pub exported: usize,
    pub skipped: usize,
    pub pages: usize,
    /// Paging stopped on an error; the file holds what came before it.
    pub fetch_aborted: bool,
}

#[derive(Debug)]
pub struct ChannelReport {
    pub channel: String,
    pub result: Result<ChannelSummary>,
}

/// Per-channel results of one run, in input order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub channels: Vec<ChannelReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.channels.iter().filter(|c| c.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.channels.len() - self.succeeded()
    }

    pub fn exported(&self) -> usize {
        self.channels
            .iter()
            .filter_map(|c| c.result.as_ref().ok())
            .map(|s| s.exported)
            .sum()
    }
}

/// Export a single channel: open, fetch the window, format, save.
pub async fn export_channel<D: ChannelDirectory>(
    directory: &D,
    channel: &str,
    window: &DateWindow,
    limit: Option<usize>,
    exporter: &JsonExporter,
) -> Result<ChannelSummary> {
    let mut history = directory.open(channel).await?;

    let fetched = fetch_window(&mut history, window, limit).await;
    let fetch_aborted = !fetched.is_complete();
    if let Some(err) = &fetched.aborted {
        warn!(
            channel,
            collected = fetched.messages.len(),
            "History fetch stopped early: {}",
            err
        );
    }

    let formatted = format_messages(&fetched.messages);
    let path = exporter.save(channel, &formatted.records)?;

    Ok(ChannelSummary {
        path,
        exported: formatted.records.len(),
        skipped: formatted.skipped.len(),
        pages: fetched.pages,
        fetch_aborted,
    })
}

/// Export every channel in order. A failing channel is logged and recorded;
/// the next one is still processed.
pub async fn export_channels<D: ChannelDirectory>(
    directory: &D,
    channels: &[String],
    window: &DateWindow,
    limit: Option<usize>,
    exporter: &JsonExporter,
) -> RunReport {
    let started = Instant::now();
    let mut report = RunReport::default();

    for channel in channels {
        let result = export_channel(directory, channel, window, limit, exporter).await;

        match &result {
            Ok(summary) => {
                metrics::record_channel_export(
                    channel,
                    summary.pages,
                    summary.exported,
                    summary.skipped,
                );
                println!(
                    "Saved {} messages from {} to {}",
                    summary.exported,
                    channel,
                    summary.path.display()
                );
            }
            Err(err) => {
                metrics::record_channel_failure();
                error!("Error processing channel {}: {}", channel, err);
            }
        }

        report.channels.push(ChannelReport {
            channel: channel.clone(),
            result,
        });
    }

    metrics::record_run(started.elapsed());
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        exported = report.exported(),
        "Run finished"
    );
    report
}
