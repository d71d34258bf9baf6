//! Index statistics.
//!
//! Prints the active namespace (provider, model, dimension, row count) and
//! every other namespace recorded in the database, so a provider switch that
//! left an old index behind is visible.

use anyhow::Result;

use crate::config::Config;
use crate::rag::ToolRag;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let rag = ToolRag::open(config.clone()).await?;
    let stats = rag.stats().await?;
    let namespaces = rag.index().store().list_namespaces().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("ToolRAG — Index Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Namespace:   {}", stats.namespace);
    println!("  Provider:    {}", stats.provider);
    println!("  Model:       {}", stats.model);
    println!("  Dims:        {}", stats.dims);
    println!("  Tools:       {}", stats.rows);

    if namespaces.len() > 1 {
        println!();
        println!("  All namespaces:");
        println!("  {:<56} {:>6}   {}", "NAMESPACE", "DIMS", "CREATED");
        println!("  {}", "-".repeat(76));
        for ns in &namespaces {
            let marker = if ns.name == stats.namespace { "*" } else { " " };
            println!(
                "{} {:<56} {:>6}   {}",
                marker,
                ns.name,
                ns.dims,
                format_ts_relative(ns.created_at)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
