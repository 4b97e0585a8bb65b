use anyhow::{Context, Result, bail};
use mind_core::OutputFormat;
use mind_memory::MindHandle;

use crate::cli::Commands;
use crate::render;

pub async fn handle_query_command(
    command: Commands,
    handle: &MindHandle,
    format: OutputFormat,
) -> Result<()> {
    let store = handle.get().await.context("failed to open memory store")?;

    match command {
        Commands::Search { query, limit } => {
            let results = store.search(&query, Some(limit)).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Text => print!("{}", render::format_search_results(&results)),
            }
        }
        Commands::Ask { question } => {
            let answer = store.ask(&question).await?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "question": question,
                        "answer": answer,
                    }))?
                ),
                OutputFormat::Text => println!("{answer}"),
            }
        }
        Commands::Context { query } => {
            let context = store.get_context(query.as_deref()).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&context)?),
                OutputFormat::Text => match render::format_context(&context) {
                    Some(text) => print!("{text}"),
                    None => println!("No memories recorded yet."),
                },
            }
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("Memory file: {}", store.memory_path().display());
                    print!("{}", render::format_stats(&stats));
                }
            }
        }
        Commands::Hook { .. } => bail!("hook events are not query commands"),
    }
    Ok(())
}
