//! Landmark Guide CLI - point a camera at a landmark, get a kid-friendly guide.
//!
//! Captures a photo (from a file or a configured network camera), recognizes
//! the landmark on-device, and asks a generative service for a short guide
//! written for a 10-year-old.
//!
//! # Usage
//!
//! ```bash
//! # Identify a landmark in a photo
//! landmark scan tower.jpg
//!
//! # Snap a photo from the configured camera
//! landmark scan --camera
//!
//! # Machine-readable output
//! landmark scan tower.jpg --json
//!
//! # View configuration
//! landmark config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Landmark Guide - identify landmarks and learn about them.
#[derive(Parser, Debug)]
#[command(name = "landmark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Identify a landmark from a photo or camera snapshot
    Scan(cli::scan::ScanArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match landmark_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `landmark config path`."
            );
            landmark_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Landmark Guide v{}", landmark_core::VERSION);

    match cli.command {
        Commands::Scan(args) => cli::scan::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
