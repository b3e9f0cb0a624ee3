//! ragstream CLI — developer tooling for the RAG pipeline.
//!
//! Commands:
//! - `config` — Show, validate or locate the configuration file
//! - `model`  — Resolve a model's capability profile
//! - `encode` — Encode a payload as an SSE frame

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragstream",
    about = "ragstream — retrieval-augmented generation pipeline tooling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the capability profile and provider parameters for a model
    Model {
        /// Model identifier (e.g. "gpt-4o-mini", "o3-mini")
        id: String,

        /// Temperature preset to resolve: precise, balanced or creative
        #[arg(short, long, default_value = "balanced")]
        preset: String,
    },

    /// Encode a JSON payload as an SSE frame
    Encode {
        /// Event name (sources, chunk, tool_invocations, final_response, error)
        #[arg(short, long)]
        event: String,

        /// JSON payload; read from stdin when omitted
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Model { id, preset } => commands::model::run(&id, &preset).await?,
        Commands::Encode { event, data } => commands::encode::run(&event, data).await?,
    }

    Ok(())
}
