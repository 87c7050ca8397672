//! Mangrove CLI: ask questions about a local document collection.
//!
//! Provides single-question and interactive chat modes, plus document
//! directory and configuration management.

mod commands;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Mangrove: answers grounded in your documents
#[derive(Parser, Debug)]
#[command(name = "mangrove", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (skips the layered lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use deterministic local services instead of the remote API
    #[arg(long)]
    offline: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// JSON file with earlier messages ([{"role": "user", "content": "..."}])
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the sources used for the answer
        #[arg(long)]
        sources: bool,
    },
    /// Start an interactive chat session
    Chat {
        /// Print the sources used for each answer
        #[arg(long)]
        sources: bool,
    },
    /// Manage the documents directory
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum DocsAction {
    /// List documents in the documents directory
    List,
    /// Copy a document into the documents directory
    Add {
        /// Path of the file to add
        path: PathBuf,
    },
    /// Remove a document from the documents directory
    Remove {
        /// File name of the document
        name: String,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
    /// Report configuration problems
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "mangrove", "mangrove")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mangrove.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let ctx = commands::Context {
        workspace,
        config_path: cli.config,
        offline: cli.offline,
    };
    commands::handle_command(cli.command, &ctx).await
}
