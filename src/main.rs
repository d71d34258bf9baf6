//! # ToolRAG CLI (`toolrag`)
//!
//! Maintains the tool embedding index and queries it.
//!
//! ## Usage
//!
//! ```bash
//! toolrag --config ./config/toolrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `toolrag init` | Create the database and the provider's namespace |
//! | `toolrag sources` | List configured tool sources and their tool counts |
//! | `toolrag sync` | Load all sources, embed new or changed tools, prune removed ones |
//! | `toolrag search "<query>"` | Print the tools relevant to a query |
//! | `toolrag stats` | Show namespace, provider and row counts |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `toolrag=info,toolrag_core=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolrag::{config, search, sources, stats, sync_cmd};

/// ToolRAG — relevance retrieval over MCP tool descriptors.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "toolrag",
    about = "ToolRAG — relevance retrieval over MCP tool descriptors",
    version,
    long_about = "ToolRAG keeps an embedding index of the tools exposed by MCP servers and \
    tool files, syncs it incrementally by content hash, and answers natural-language queries \
    with a ranked, threshold-filtered list of function-tool definitions."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/toolrag.toml`.
    #[arg(long, global = true, default_value = "./config/toolrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and the active provider's namespace.
    ///
    /// Idempotent. Fails if the namespace exists with another dimension.
    Init,

    /// List configured tool sources and how many tools each reports.
    Sources,

    /// Sync the index with every configured source.
    ///
    /// Embeds tools whose descriptor changed since the last sync and
    /// deletes tools no source reports anymore.
    Sync,

    /// Find the tools relevant to a query.
    Search {
        /// The natural-language query.
        query: String,

        /// Minimum relevance in [-1, 1]. Defaults to `retrieval.relevance_threshold`.
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,

        /// Print function-tool definitions as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolrag=info,toolrag_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            sync_cmd::run_init(&cfg).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Sync => {
            sync_cmd::run_sync(&cfg).await?;
        }
        Commands::Search {
            query,
            threshold,
            json,
        } => {
            search::run_search(&cfg, &query, threshold, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
