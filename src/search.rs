//! `toolrag search`: print the tools relevant to a query.

use anyhow::Result;

use toolrag_core::FunctionTool;

use crate::config::Config;
use crate::rag::ToolRag;

pub async fn run_search(
    config: &Config,
    query: &str,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let mut rag = ToolRag::open(config.clone()).await?;
    let tools = rag.list_tools(query, threshold).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if tools.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_tools(&tools);
    Ok(())
}

fn print_tools(tools: &[FunctionTool]) {
    for (i, tool) in tools.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, tool.relevance, tool.name);
        if !tool.description.is_empty() {
            println!("    {}", tool.description.replace('\n', " ").trim());
        }
        if !tool.parameters.properties.is_empty() {
            let params: Vec<String> = tool
                .parameters
                .properties
                .keys()
                .map(|name| {
                    if tool.parameters.required.contains(name) {
                        name.clone()
                    } else {
                        format!("{}?", name)
                    }
                })
                .collect();
            println!("    params: {}", params.join(", "));
        }
        println!();
    }
}
