//! CLI parser and command dispatch.

mod check;
mod helpers;
mod items;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(about = "E-commerce price tracking with anti-bot extraction")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Track a new product URL
    Add {
        /// Product URL (Amazon or Flipkart)
        url: String,
        /// Notify when the price reaches this threshold
        target_price: f64,
        /// Optional free-text tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Stop tracking an item
    Remove {
        /// Item id (prefix accepted)
        id: String,
    },

    /// List tracked items
    List,

    /// Run one check pass now
    Check {
        /// Check a single item instead of all
        #[arg(long)]
        id: Option<String>,
    },

    /// Poll continuously on the configured interval
    Watch {
        /// Override the poll interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Add {
            url,
            target_price,
            tag,
        } => items::cmd_add(&settings, &url, target_price, tag),
        Commands::Remove { id } => items::cmd_remove(&settings, &id),
        Commands::List => items::cmd_list(&settings),
        Commands::Check { id } => check::cmd_check(&settings, id.as_deref()).await,
        Commands::Watch { interval } => check::cmd_watch(&settings, interval).await,
    }
}
