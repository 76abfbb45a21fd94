//! Configuration: YAML run settings, Telegram credentials, CLI overrides
//!
//! Channels and the date range come from `config.yaml` and may be overridden
//! on the command line. Credentials come from the environment (`.env` is
//! loaded first) and fall back to the optional `telegram:` section of the
//! YAML file, whose values may be `${VAR}` placeholders.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::export::DEFAULT_OUTPUT_DIR;
use crate::history::DateWindow;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const SESSION_NAME: &str = "telegram_session";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Contents of the YAML config file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub channels: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
    pub output_dir: Option<String>,
    pub telegram: Option<TelegramSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramSection {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,
    pub session_name: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    }))
}

impl FileConfig {
    /// Load the config file. A missing file is treated as empty; an
    /// unreadable or malformed one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using command line only", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub channels: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub channels: Vec<String>,
    pub window: DateWindow,
    /// Per-channel message cap; `None` means unlimited.
    pub limit: Option<usize>,
    pub output_dir: PathBuf,
    pub session_name: String,
}

impl Settings {
    /// Merge CLI overrides with the file.
    ///
    /// Returns `MissingSettings` when channels or either date cannot be
    /// found in either source, `InvalidArgument` when they are present but
    /// unusable.
    pub fn resolve(cli: &CliOverrides, file: &FileConfig) -> Result<Self> {
        let channels = cli
            .channels
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| file.channels.clone())
            .unwrap_or_default();
        let start = cli.start_date.as_deref().or(file.start_date.as_deref());
        let end = cli.end_date.as_deref().or(file.end_date.as_deref());

        let (Some(start), Some(end)) = (start, end) else {
            return Err(missing_settings());
        };
        if channels.is_empty() {
            return Err(missing_settings());
        }

        let window = DateWindow::from_dates(parse_date(start)?, parse_date(end)?)?;

        Ok(Self {
            channels,
            window,
            limit: cli.limit.or(file.limit).filter(|&l| l > 0),
            output_dir: cli
                .output_dir
                .clone()
                .or_else(|| file.output_dir.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            session_name: file
                .telegram
                .as_ref()
                .and_then(|t| t.session_name.clone())
                .unwrap_or_else(|| SESSION_NAME.to_string()),
        })
    }

    pub fn session_file(&self) -> PathBuf {
        session_file(&self.session_name)
    }

    pub fn lock_file(&self) -> PathBuf {
        lock_file(&self.session_name)
    }
}

fn missing_settings() -> Error {
    Error::MissingSettings(
        "Channels, start_date, and end_date must be specified in config or as arguments."
            .to_string(),
    )
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        Error::InvalidArgument(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
    })
}

/// Path of the SQLite session file for a session name.
pub fn session_file(session_name: &str) -> PathBuf {
    PathBuf::from(format!("{}.session", session_name))
}

/// Lock file guarding a session against concurrent use.
pub fn lock_file(session_name: &str) -> PathBuf {
    PathBuf::from(format!("{}.lock", session_name))
}

/// Telegram API credentials.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials; `API_ID`, `API_HASH` and `PHONE` win over the
    /// YAML section.
    pub fn resolve(section: Option<&TelegramSection>) -> Result<Self> {
        let api_id = resolve_env_string("API_ID", section.and_then(|t| t.api_id.as_deref()));
        let api_hash = resolve_env_string("API_HASH", section.and_then(|t| t.api_hash.as_deref()));
        let phone = resolve_env_string("PHONE", section.and_then(|t| t.phone.as_deref()));

        if api_id.is_empty() || api_hash.is_empty() {
            return Err(Error::ConfigError(
                "API_ID and API_HASH must be set in the environment or .env".to_string(),
            ));
        }
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::ConfigError(format!("API_ID must be an integer, got '{}'", api_id)))?;

        Ok(Self {
            api_id,
            api_hash,
            phone,
        })
    }
}

/// Load .env file into environment variables using dotenvy
pub fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("../.env");
    }
}

/// Prefer the environment variable; otherwise use the file value, expanding
/// a `${VAR}` placeholder.
fn resolve_env_string(env_key: &str, value: Option<&str>) -> String {
    if let Ok(env_val) = std::env::var(env_key) {
        if !env_val.is_empty() {
            return env_val;
        }
    }
    match value {
        Some(v) if v.starts_with("${") && v.ends_with('}') => {
            std::env::var(&v[2..v.len() - 1]).unwrap_or_default()
        }
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
