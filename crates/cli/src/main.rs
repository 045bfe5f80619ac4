//! Scholar CLI
//!
//! Main entry point for the scholar command-line tool: feeds paper chunks and
//! their embeddings into the semantic index and runs similarity searches.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ChunksCommand, EmbedCommand, SearchCommand, StatsCommand};
use scholar_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Scholar - semantic retrieval over paper chunks
#[derive(Parser, Debug)]
#[command(name = "scholar")]
#[command(about = "Semantic retrieval over paper chunks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SCHOLAR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SCHOLAR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage chunks produced by the ingestion pipeline
    Chunks(ChunksCommand),

    /// Attach embeddings to existing chunks
    Embed(EmbedCommand),

    /// Find the chunks closest to a query embedding
    Search(SearchCommand),

    /// Show store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Workspace and config file decide which YAML is read, so they go in first.
    let config = AppConfig::load_with(cli.workspace, cli.config)?.with_overrides(
        None,
        None,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Chunks(_) => "chunks",
        Commands::Embed(_) => "embed",
        Commands::Search(_) => "search",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Chunks(cmd) => cmd.execute(&config).await,
        Commands::Embed(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
