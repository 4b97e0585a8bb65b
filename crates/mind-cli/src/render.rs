//! Plain-text renderings shared by the hooks and the query commands.

use std::fmt::Write as _;

use chrono::DateTime;
use mind_compress::truncate_chars;
use mind_core::{InjectedContext, MindStats, Observation, SearchResult};

const SNIPPET_MAX_CHARS: usize = 120;

pub fn format_timestamp(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn observation_line(observation: &Observation) -> String {
    let mut line = format!(
        "- {} [{}] {}",
        format_timestamp(observation.timestamp),
        observation.obs_type,
        observation.summary
    );
    if let Some(tool) = &observation.tool {
        let _ = write!(line, " ({tool})");
    }
    line
}

/// Markdown block injected at session start. `None` when there is nothing
/// to inject.
pub fn format_context(context: &InjectedContext) -> Option<String> {
    if context.recent_observations.is_empty() && context.relevant_memories.is_empty() {
        return None;
    }

    let mut out = String::from("# Memory from previous sessions\n");
    if !context.recent_observations.is_empty() {
        let _ = writeln!(
            out,
            "\n## Recent observations ({}, ~{} tokens)",
            context.recent_observations.len(),
            context.token_count
        );
        for observation in &context.recent_observations {
            out.push_str(&observation_line(observation));
            out.push('\n');
        }
    }
    if !context.relevant_memories.is_empty() {
        let _ = writeln!(
            out,
            "\n## Relevant memories ({})",
            context.relevant_memories.len()
        );
        for observation in &context.relevant_memories {
            out.push_str(&observation_line(observation));
            out.push('\n');
        }
    }
    Some(out)
}

pub fn format_search_results(results: &[SearchResult]) -> String {
    let mut out = format!("Memory Search Results ({} matches):\n", results.len());
    for (idx, result) in results.iter().enumerate() {
        let observation = &result.observation;
        let _ = writeln!(
            out,
            "\n#{} [{:.2}] {}  {}  [{}] [{}]",
            idx + 1,
            result.score,
            format_timestamp(observation.timestamp),
            observation.obs_type,
            observation.tool.as_deref().unwrap_or("-"),
            observation.summary
        );
        if !result.snippet.is_empty() {
            let _ = writeln!(out, "   {}", truncate_chars(&result.snippet, SNIPPET_MAX_CHARS));
        }
    }
    out
}

pub fn format_stats(stats: &MindStats) -> String {
    let mut out = String::from("Memory Statistics:\n");
    let _ = writeln!(out, "  Observations: {}", stats.total_observations);
    let _ = writeln!(out, "  Sessions:     {}", stats.total_sessions);
    let _ = writeln!(out, "  File size:    {} bytes", stats.file_size);
    if let (Some(oldest), Some(newest)) = (stats.oldest_memory, stats.newest_memory) {
        let _ = writeln!(
            out,
            "  Range:        {} .. {}",
            format_timestamp(oldest),
            format_timestamp(newest)
        );
    }
    if !stats.observations_by_type.is_empty() {
        out.push_str("  By type:\n");
        for (kind, count) in &stats.observations_by_type {
            let _ = writeln!(out, "    {:<10} {count}", kind.as_str());
        }
    }
    out
}
