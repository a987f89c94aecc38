//! cairn CLI — the main entry point.
//!
//! Commands:
//! - `doc`     — Create, list, show and edit documents
//! - `search`  — Semantic search across documents
//! - `chat`    — Interactive or single-message chat with retrieval
//! - `config`  — Show, locate, validate or initialize the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::config_cmd::ConfigCommand;
use commands::doc::DocCommand;

#[derive(Parser)]
#[command(
    name = "cairn",
    about = "cairn — hierarchical document store with semantic retrieval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of ~/.cairn/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage documents
    Doc {
        #[command(subcommand)]
        command: DocCommand,
    },

    /// Search documents for entries close to a query
    Search {
        query: String,

        /// Only search these documents (repeatable; default: all)
        #[arg(short, long = "title")]
        titles: Vec<String>,

        /// Maximum hits per document
        #[arg(short, long, default_value_t = 15)]
        limit: usize,

        /// Minimum similarity
        #[arg(long, default_value_t = 0.4)]
        threshold: f32,
    },

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Load these documents before the first turn (repeatable)
        #[arg(short, long = "load")]
        load: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Doc { command } => commands::doc::run(config_path, command).await?,
        Commands::Search {
            query,
            titles,
            limit,
            threshold,
        } => commands::search::run(config_path, &query, &titles, limit, threshold).await?,
        Commands::Chat { message, load } => commands::chat::run(config_path, message, &load).await?,
        Commands::Config { command } => commands::config_cmd::run(config_path, command).await?,
    }

    Ok(())
}
