//! Telegram channel parser - main entry point
//!
//! Exports the history of each channel within a date range to JSON.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use telegram_parser::commands::export_channels;
use telegram_parser::config::{
    load_dotenv, CliOverrides, Credentials, FileConfig, Settings, DEFAULT_CONFIG_PATH,
};
use telegram_parser::error::Error;
use telegram_parser::lifecycle::{
    interruptible, run_scoped, shutdown_signal, Completion, Lifecycle,
};
use telegram_parser::session::{connect, SessionLock};
use telegram_parser::{metrics, JsonExporter};

#[derive(Parser)]
#[command(name = "telegram_parser")]
#[command(about = "Export Telegram channel history for a date range to JSON", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Channels to parse (e.g., @durov or a numeric id)
    #[arg(long, num_args = 1..)]
    channels: Option<Vec<String>>,

    /// First day to export, inclusive (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<String>,

    /// Day to stop at, exclusive (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<String>,

    /// Maximum number of messages per channel (0 = unlimited)
    #[arg(long)]
    limit: Option<usize>,

    /// Directory for the JSON files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            channels: self.channels.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            limit: self.limit,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_parser=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let file = FileConfig::load(&cli.config)?;
    let settings = match Settings::resolve(&cli.overrides(), &file) {
        Ok(settings) => settings,
        Err(Error::MissingSettings(message)) => {
            println!("{}", message);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let credentials = Credentials::resolve(file.telegram.as_ref())?;

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    info!(
        channels = settings.channels.len(),
        start = %settings.window.start(),
        end = %settings.window.end(),
        "Starting export"
    );

    // One listener for the whole run, so a signal during login is handled too.
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let _lock = SessionLock::acquire(settings.lock_file())?;
    let session_file = settings.session_file();
    let connecting = connect(&session_file, &credentials);
    let client = match interruptible(&mut shutdown, connecting).await {
        Completion::Finished(client) => client?,
        Completion::Interrupted => {
            info!("Interrupted before the export started");
            return Ok(());
        }
    };
    let lifecycle = Lifecycle::new(client);
    let exporter = JsonExporter::new(&settings.output_dir);

    let completion = run_scoped(&lifecycle, &mut shutdown, async {
        Ok(export_channels(
            lifecycle.connection(),
            &settings.channels,
            &settings.window,
            settings.limit,
            &exporter,
        )
        .await)
    })
    .await?;

    match completion {
        Completion::Finished(report) => {
            for channel in report.channels.iter().filter(|c| c.result.is_err()) {
                warn!(channel = %channel.channel, "Channel was not exported");
            }
            println!(
                "Done: {} of {} channels exported, {} messages",
                report.succeeded(),
                report.channels.len(),
                report.exported()
            );
        }
        Completion::Interrupted => info!("Interrupted, exiting"),
    }

    Ok(())
}
