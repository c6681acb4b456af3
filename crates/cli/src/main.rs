//! Incidex CLI
//!
//! Main entry point for the incidex command-line tool.
//! Builds the incident vector store, answers questions from it, and serves
//! the HTTP query API.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, QueryCommand, ServeCommand, StatsCommand};
use incidex_core::{config::AppConfig, logging};
use std::path::PathBuf;
use tracing::Instrument;

/// Incidex - grounded question answering over a municipal incident log
#[derive(Parser, Debug)]
#[command(name = "incidex")]
#[command(about = "Grounded question answering over a municipal incident log", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "INCIDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the persisted vector store
    #[arg(short, long, global = true, env = "INCIDEX_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation provider (ollama, mock)
    #[arg(short, long, global = true, env = "INCIDEX_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "INCIDEX_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and index the incident records
    Build(BuildCommand),

    /// Answer one question from the vector store
    Query(QueryCommand),

    /// Serve the HTTP query API
    Serve(ServeCommand),

    /// Show aggregate counts over the incident records
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then config file, then environment
    let config = AppConfig::load(cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.storage_dir,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );
    config.validate()?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Incidex CLI starting");
    tracing::debug!("Storage dir: {:?}", config.storage_dir);
    tracing::debug!("Records: {:?}", config.records_path);
    tracing::debug!(
        "Embedding: {} / {} ({} dims)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );
    tracing::debug!(
        "Generation: {} / {}",
        config.generation.provider,
        config.generation.model
    );

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Query(_) => "query",
        Commands::Serve(_) => "serve",
        Commands::Stats(_) => "stats",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Build(cmd) => cmd.execute(&config).await,
            Commands::Query(cmd) => cmd.execute(&config).await,
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
