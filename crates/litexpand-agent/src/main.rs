//! litexpand: grow a local paper corpus from the literature reviews written
//! over it.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "litexpand", version, about = "Literature review and reference acquisition")]
struct Cli {
    /// Config file (defaults to $LITEXPAND_CONFIG, then ./litexpand.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a literature review of the corpus and download the papers it names
    Expand,
    /// Ask questions about the corpus interactively
    Chat,
    /// Extract titles from text and download them, without an LLM
    Fetch {
        /// Text to scan; stdin is read when neither TEXT nor --file is given
        text: Option<String>,
        /// Read the text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("litexpand=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("litexpand {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        model = %config.llm.model,
        data_dir = %config.acquisition.data_dir.display(),
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Command::Expand) {
        Command::Expand => {
            commands::ensure_api_key(&mut config)?;
            commands::expand::run(&config).await
        }
        Command::Chat => {
            commands::ensure_api_key(&mut config)?;
            commands::chat::run(&config).await
        }
        Command::Fetch { text, file } => commands::fetch::run(&config, text, file).await,
    }
}
