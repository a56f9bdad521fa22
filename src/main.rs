//! # spendlens CLI
//!
//! Commands for running the HTTP API and for offline debugging of the
//! extraction heuristics.
//!
//! ## Usage
//!
//! ```bash
//! spendlens --config ./config/spendlens.toml serve
//! spendlens extract receipt.pdf
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use spendlens::config::{self, Config};
use spendlens::extract::{mime_from_extension, BuiltinExtractor, TextExtractor};
use spendlens::record::extract_record;
use spendlens::server;

/// spendlens — session-scoped bill ingestion, semantic retrieval, and
/// spending analytics.
#[derive(Parser)]
#[command(
    name = "spendlens",
    about = "Session-scoped bill ingestion, semantic retrieval, and spending analytics service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/spendlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON HTTP API.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// session, upload, search, chat, and analysis endpoints.
    Serve,

    /// Extract a structured bill record from a local file and print it.
    ///
    /// Runs the same extraction and classification heuristics the upload
    /// pipeline uses — handy for tuning them against real receipts
    /// without a running server.
    Extract {
        /// Path to a .pdf or .txt file.
        path: PathBuf,
    },
}

fn load_or_default(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spendlens=info".parse()?),
        )
        .try_init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Extract { path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string();
            let mime = mime_from_extension(&filename)
                .ok_or_else(|| anyhow::anyhow!("unrecognized file extension: {}", filename))?;
            let bytes = std::fs::read(&path)?;
            let text = BuiltinExtractor.extract_text(&bytes, mime)?;
            let record = extract_record(&text, &filename);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
