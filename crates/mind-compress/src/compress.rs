use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::summarize::{self, Summary};

/// Outputs at or below this many characters are stored verbatim.
pub const COMPRESSION_THRESHOLD: usize = 3000;
/// Hard ceiling on the length of compressed output, in characters.
pub const TARGET_CEILING: usize = 2000;
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedOutput {
    pub compressed: String,
    pub was_compressed: bool,
    /// Length of the raw output, in characters.
    pub original_size: usize,
}

/// Reduce tool output to a bounded, information-dense summary.
///
/// Output at or below [`COMPRESSION_THRESHOLD`] characters passes through
/// unchanged. Anything longer goes through the summarizer for `tool_name`
/// and is then held to [`TARGET_CEILING`] characters.
pub fn compress(tool_name: &str, tool_input: &Value, output: &str) -> CompressedOutput {
    let original_size = output.chars().count();
    if original_size <= COMPRESSION_THRESHOLD {
        return CompressedOutput {
            compressed: output.to_string(),
            was_compressed: false,
            original_size,
        };
    }

    let summary = summarize::summarize(tool_name, tool_input, output);
    let compressed = fit_to_ceiling(summary);

    tracing::debug!(
        tool = tool_name,
        original_size,
        compressed_size = compressed.chars().count(),
        "compressed tool output"
    );

    CompressedOutput {
        compressed,
        was_compressed: true,
        original_size,
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Cut the body so body + footer fit the ceiling; the footer is never cut.
fn fit_to_ceiling(summary: Summary) -> String {
    let footer = summary
        .footer
        .map(|footer| truncate_chars(&footer, TARGET_CEILING / 4));
    let footer_len = footer.as_ref().map_or(0, |f| f.chars().count() + 1);
    let body_budget = TARGET_CEILING - footer_len;

    let mut text = if summary.body.chars().count() > body_budget {
        let keep = body_budget - TRUNCATION_MARKER.chars().count();
        let mut cut = truncate_chars(&summary.body, keep);
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        summary.body
    };

    if let Some(footer) = footer {
        text.push('\n');
        text.push_str(&footer);
    }
    text
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
