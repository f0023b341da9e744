use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;
mod commands;
mod config;
mod controller;
mod error;
mod events;
mod prompts;
mod runtime;
mod session;
mod storage;
mod ui;

use config::Config;

const LOG_FILTER_ENV: &str = "CHATTR_LOG";

#[derive(Parser)]
#[command(name = "chattr")]
#[command(version = "0.1.0")]
#[command(about = "Terminal chat client for Rasa-style webhook agents", long_about = None)]
struct Cli {
    /// Agent server root, overrides the config file and CHATTR_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Read configuration from this file instead of ~/.chattr/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat screen (default)
    Chat,
    /// Print the saved conversation
    History,
    /// Erase the saved conversation
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check whether the agent server is reachable
    Ping,
    /// Write the current settings to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Send one message and print the replies
    Send {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

fn init_tracing(config: &Config) -> Result<()> {
    let log_path = config.log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_FILTER_ENV)
                .unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    if let Some(url) = cli.base_url {
        config = config.with_base_url(url);
    }

    init_tracing(&config)?;

    match cli.command {
        None | Some(Commands::Chat) => ui::app::run(config).await,
        Some(Commands::History) => commands::print_history(&config),
        Some(Commands::Clear { yes }) => commands::clear_history(&config, yes),
        Some(Commands::Ping) => commands::ping(&config).await,
        Some(Commands::Init { force }) => commands::init_config(&config, &config_path, force),
        Some(Commands::Send { text }) => commands::send_once(&config, &text.join(" ")).await,
    }
}
