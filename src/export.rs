//! JSON export of formatted channel messages

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::format::MessageRecord;

pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// File stem for a channel: the reference without `@`, path separators
/// replaced.
pub fn file_stem(channel: &str) -> String {
    channel
        .replace('@', "")
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// `<dir>/<channel>_messages.json`
pub fn output_path(dir: &Path, channel: &str) -> PathBuf {
    dir.join(format!("{}_messages.json", file_stem(channel)))
}

/// Writes one JSON file per channel into a directory.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save records as a pretty-printed UTF-8 JSON array, replacing any
    /// previous export of the same channel.
    pub fn save(&self, channel: &str, records: &[MessageRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = output_path(&self.dir, channel);
        info!("Saving messages to {}...", path.display());

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;

        info!(
            "Successfully saved {} messages to {}",
            records.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Read an export back.
pub fn load_records(path: &Path) -> Result<Vec<MessageRecord>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
