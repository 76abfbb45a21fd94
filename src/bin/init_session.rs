//! Session initialization binary.

use std::path::PathBuf;

use clap::Parser;
use telegram_parser::commands::init_session;
use telegram_parser::config::{load_dotenv, DEFAULT_CONFIG_PATH};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "init_session")]
#[command(about = "Authorize the Telegram session used by telegram_parser")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("telegram_parser=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    init_session::run(&cli.config).await?;
    Ok(())
}
