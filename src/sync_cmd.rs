//! `toolrag init` and `toolrag sync`.

use anyhow::Result;

use crate::config::Config;
use crate::rag::ToolRag;

/// Create the database and the active provider's namespace table.
pub async fn run_init(config: &Config) -> Result<()> {
    let rag = ToolRag::open(config.clone()).await?;
    println!("Database initialized successfully.");
    println!("  namespace: {}", rag.index().namespace());
    Ok(())
}

/// Load all sources, embed new or changed tools, and prune removed ones.
pub async fn run_sync(config: &Config) -> Result<()> {
    let mut rag = ToolRag::open(config.clone()).await?;
    let summary = rag.sync().await?;

    println!("sync {}", rag.index().namespace());
    println!("  tools: {}", summary.tools);
    println!("  embedded: {}", summary.report.written.len());
    println!("  unchanged: {}", summary.report.unchanged);
    println!("  pruned: {}", summary.pruned);
    for name in &summary.report.written {
        println!("    + {}", name);
    }
    Ok(())
}
