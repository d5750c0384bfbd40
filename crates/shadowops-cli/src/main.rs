//! ShadowOps CLI - cluster support tickets into an actionable digest.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "shadowops")]
#[command(author, version, about = "ShadowOps - Support ticket digests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: shadowops.toml in the current or a parent directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default shadowops.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Cluster tickets and produce a digest
    Digest {
        /// Ticket file: one ticket per line or a JSON array ("-" for stdin)
        input: String,

        /// Average handling time per ticket, in minutes
        #[arg(short, long, default_value = "30")]
        avg_minutes: f64,

        /// Hourly cost in USD
        #[arg(short = 'c', long, default_value = "40")]
        hourly_cost: f64,

        /// Print the digest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find tickets similar to a query
    Similar {
        /// Ticket file: one ticket per line or a JSON array ("-" for stdin)
        input: String,

        /// Search query
        query: String,

        /// Maximum results to return
        #[arg(short, long, default_value = "5")]
        top: usize,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Digest {
            input,
            avg_minutes,
            hourly_cost,
            json,
        } => {
            let config = config::load(cli.config.as_deref())?;
            commands::digest::run(&input, avg_minutes, hourly_cost, json, &config).await
        }
        Commands::Similar { input, query, top } => {
            let config = config::load(cli.config.as_deref())?;
            commands::similar::run(&input, &query, top, &config).await
        }
    }
}
