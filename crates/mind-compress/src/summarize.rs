//! Per-tool summarizers. Each one keeps the lines most likely to explain why
//! an observation matters (errors, structure, change) and drops the rest.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::compress::truncate_chars;
use crate::patterns::{
    ERROR_LINE_RE, EXPORT_RE, FUNCTION_RE, IMPORT_RE, SUCCESS_LINE_RE, TODO_RE, TYPE_DECL_RE,
    strip_line_number,
};

const LISTED_LINE_MAX_CHARS: usize = 160;
const COMMAND_MAX_CHARS: usize = 100;
const PATTERN_MAX_CHARS: usize = 50;
const EDIT_PREVIEW_CHARS: usize = 500;

pub(crate) struct Summary {
    pub body: String,
    /// Kept intact when the body is cut to the ceiling.
    pub footer: Option<String>,
}

impl Summary {
    fn body(body: String) -> Self {
        Self { body, footer: None }
    }
}

pub(crate) fn summarize(tool_name: &str, tool_input: &Value, output: &str) -> Summary {
    match tool_name.trim().to_ascii_lowercase().as_str() {
        "read" | "notebookread" => Summary::body(summarize_file_read(tool_input, output)),
        "bash" | "shell" => summarize_command(tool_input, output),
        "grep" | "search" => Summary::body(summarize_pattern_search(tool_input, output)),
        "glob" => Summary::body(summarize_glob(output)),
        "edit" | "multiedit" | "write" | "notebookedit" => {
            Summary::body(summarize_edit(tool_input, output))
        }
        _ => Summary::body(summarize_generic(output)),
    }
}

fn input_str<'a>(input: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .filter(|value| !value.trim().is_empty())
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn push_section(out: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push(format!("{title} ({}):", items.len()));
    out.extend(
        items
            .iter()
            .map(|item| format!("  {}", truncate_chars(item, LISTED_LINE_MAX_CHARS))),
    );
}

fn push_head_tail(out: &mut Vec<String>, lines: &[&str], head: usize, tail: usize) {
    if lines.len() <= head + tail {
        out.push("Content:".to_string());
        out.extend(lines.iter().map(|line| line.to_string()));
        return;
    }
    out.push(format!("First {head} lines:"));
    out.extend(lines[..head].iter().map(|line| line.to_string()));
    out.push(format!(
        "... ({} lines omitted) ...",
        lines.len() - head - tail
    ));
    out.push(format!("Last {tail} lines:"));
    out.extend(lines[lines.len() - tail..].iter().map(|line| line.to_string()));
}

fn summarize_file_read(input: &Value, output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let name = input_str(input, &["file_path", "path", "notebook_path"])
        .map(file_name)
        .unwrap_or_else(|| "unknown".to_string());

    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut functions = Vec::new();
    let mut type_names = BTreeSet::new();
    let mut type_order = Vec::new();
    let mut notes = Vec::new();

    for raw in &lines {
        let line = strip_line_number(raw);
        let trimmed = line.trim();
        if IMPORT_RE.is_match(line) && imports.len() < 10 {
            imports.push(trimmed.to_string());
        }
        if EXPORT_RE.is_match(line) && exports.len() < 10 {
            exports.push(trimmed.to_string());
        }
        if FUNCTION_RE.is_match(line) && functions.len() < 10 {
            functions.push(trimmed.trim_end_matches('{').trim_end().to_string());
        }
        for caps in TYPE_DECL_RE.captures_iter(line) {
            if let Some(found) = caps.get(1)
                && type_names.insert(found.as_str().to_string())
            {
                type_order.push(found.as_str().to_string());
            }
        }
        if TODO_RE.is_match(line) && notes.len() < 5 {
            notes.push(trimmed.to_string());
        }
    }

    let mut out = vec![format!("File: {name} ({} lines)", lines.len())];
    push_section(&mut out, "Imports", &imports);
    push_section(&mut out, "Exports", &exports);
    push_section(&mut out, "Functions", &functions);
    if !type_order.is_empty() {
        out.push(format!("Types: {}", type_order.join(", ")));
    }
    push_section(&mut out, "Notes", &notes);
    push_head_tail(&mut out, &lines, 10, 5);
    out.join("\n")
}

fn summarize_command(input: &Value, output: &str) -> Summary {
    let lines: Vec<&str> = output.lines().collect();
    let command = input_str(input, &["command", "cmd"])
        .and_then(|command| command.lines().next())
        .map(|first| truncate_chars(first.trim(), COMMAND_MAX_CHARS))
        .unwrap_or_else(|| "unknown".to_string());

    let errors: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| ERROR_LINE_RE.is_match(line))
        .collect();
    let successes: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| SUCCESS_LINE_RE.is_match(line))
        .collect();

    let mut out = vec![format!("Command: {command}")];
    if !errors.is_empty() {
        out.push(format!("Errors ({}):", errors.len()));
        out.extend(
            errors
                .iter()
                .take(10)
                .map(|line| format!("  {}", truncate_chars(line.trim(), LISTED_LINE_MAX_CHARS))),
        );
    }
    if !successes.is_empty() {
        out.push(format!("Success indicators ({}):", successes.len()));
        out.extend(
            successes
                .iter()
                .take(5)
                .map(|line| format!("  {}", truncate_chars(line.trim(), LISTED_LINE_MAX_CHARS))),
        );
    }

    if lines.len() < 20 {
        out.push("Output:".to_string());
        out.push(output.to_string());
    } else {
        push_head_tail(&mut out, &lines, 10, 5);
    }

    Summary {
        body: out.join("\n"),
        footer: Some(format!("Total lines: {}", lines.len())),
    }
}

/// File part of a `path:line:content` or `path:content` match line.
fn match_file(line: &str) -> Option<&str> {
    let candidate = line.split(':').next()?.trim();
    if candidate.is_empty() || candidate.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(candidate)
}

fn summarize_pattern_search(input: &Value, output: &str) -> String {
    let lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();
    let pattern = input_str(input, &["pattern", "query"])
        .map(|pattern| truncate_chars(pattern, PATTERN_MAX_CHARS))
        .unwrap_or_else(|| "unknown".to_string());

    let mut files: Vec<&str> = Vec::new();
    let mut seen = BTreeSet::new();
    for line in &lines {
        if let Some(file) = match_file(line)
            && seen.insert(file)
        {
            files.push(file);
        }
    }

    let mut out = vec![
        format!("Pattern: {pattern}"),
        format!("Matches: {} lines in {} files", lines.len(), files.len()),
    ];
    if !files.is_empty() {
        out.push("Files:".to_string());
        out.extend(files.iter().take(15).map(|file| format!("  {file}")));
        if files.len() > 15 {
            out.push(format!("  ... +{} more files", files.len() - 15));
        }
    }
    out.push("First matches:".to_string());
    out.extend(
        lines
            .iter()
            .take(10)
            .map(|line| truncate_chars(line, LISTED_LINE_MAX_CHARS)),
    );
    if lines.len() > 10 {
        out.push(format!("... +{} more", lines.len() - 10));
    }
    out.join("\n")
}

#[derive(Deserialize)]
struct GlobListing {
    filenames: Vec<String>,
}

/// File list from a glob result: JSON `{"filenames": [...]}` or plain lines.
fn glob_filenames(output: &str) -> Vec<String> {
    match serde_json::from_str::<GlobListing>(output) {
        Ok(listing) => listing.filenames,
        Err(err) => {
            tracing::trace!(error = %err, "glob output is not JSON; splitting lines");
            output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

fn summarize_glob(output: &str) -> String {
    let files = glob_filenames(output);

    let mut by_dir: BTreeMap<String, usize> = BTreeMap::new();
    for file in &files {
        let dir = Path::new(file)
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .filter(|parent| !parent.is_empty())
            .unwrap_or_else(|| ".".to_string());
        *by_dir.entry(dir).or_default() += 1;
    }
    let mut dirs: Vec<(String, usize)> = by_dir.into_iter().collect();
    // Count descending; the BTreeMap order breaks ties by name.
    dirs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = vec![format!(
        "Found {} files in {} directories",
        files.len(),
        dirs.len()
    )];
    if !dirs.is_empty() {
        out.push("Top directories:".to_string());
        out.extend(
            dirs.iter()
                .take(5)
                .map(|(dir, count)| format!("  {dir}/ ({count} files)")),
        );
    }
    let samples: Vec<String> = files.iter().take(15).map(|file| file_name(file)).collect();
    if !samples.is_empty() {
        out.push(format!("Sample files: {}", samples.join(", ")));
    }
    out.join("\n")
}

fn summarize_edit(input: &Value, output: &str) -> String {
    let name = input_str(input, &["file_path", "path", "notebook_path"])
        .map(file_name)
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "File: {name}\nStatus: edited successfully\n{}",
        truncate_chars(output, EDIT_PREVIEW_CHARS)
    )
}

fn summarize_generic(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= 30 {
        return output.to_string();
    }
    let mut out = vec![format!("Output ({} lines):", lines.len())];
    out.extend(lines[..15].iter().map(|line| line.to_string()));
    out.push(format!("... ({} lines omitted) ...", lines.len() - 25));
    out.extend(lines[lines.len() - 10..].iter().map(|line| line.to_string()));
    out.join("\n")
}

#[cfg(test)]
#[path = "summarize_tests.rs"]
mod tests;
