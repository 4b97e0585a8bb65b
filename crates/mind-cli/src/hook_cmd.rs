//! Host hook adapter.
//!
//! Each hook reads one JSON event from stdin and always answers with a
//! response that lets the host continue: store failures are logged at debug
//! level and otherwise ignored, so a busy or broken memory file never blocks
//! the tool that triggered the hook.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use mind_compress::{classify, compress, truncate_chars};
use mind_config::MindConfig;
use mind_core::{
    Metadata, MetadataValue, Observation, ObservationInput, ObservationType, SessionSummary,
};
use mind_memory::{MindHandle, MindStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::HookEvent;
use crate::git_changes;
use crate::render;

pub const HOST_SESSION_KEY: &str = "host_session_id";
const SUMMARY_MAX_CHARS: usize = 80;
const KEY_DECISIONS_MAX: usize = 10;

/// Tools whose output is bookkeeping rather than project knowledge.
const SKIPPED_TOOLS: &[&str] = &["todowrite", "todoread", "exitplanmode", "askuserquestion"];

/// The subset of the host's hook payload the adapter reads.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(rename = "continue")]
    pub proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: &'static str,
    pub additional_context: String,
}

impl HookOutput {
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            hook_specific_output: None,
        }
    }

    fn with_context(event: HookEvent, additional_context: String) -> Self {
        Self {
            proceed: true,
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event.host_name(),
                additional_context,
            }),
        }
    }
}

/// Run one hook event. Never fails.
pub async fn run(event: HookEvent, handle: &MindHandle, config: &MindConfig) -> HookOutput {
    let input = parse_hook_input(&read_stdin());
    match handle_event(event, handle, config, &input).await {
        Ok(output) => output,
        Err(error) => {
            tracing::debug!(event = event.host_name(), error = %format!("{error:#}"), "hook skipped");
            HookOutput::proceed()
        }
    }
}

async fn handle_event(
    event: HookEvent,
    handle: &MindHandle,
    config: &MindConfig,
    input: &HookInput,
) -> Result<HookOutput> {
    match event {
        HookEvent::SessionStart => {
            let store = handle.get().await?;
            let context = store.get_context(None).await?;
            Ok(match render::format_context(&context) {
                Some(text) => HookOutput::with_context(event, text),
                None => HookOutput::proceed(),
            })
        }
        HookEvent::PostToolUse => {
            let Some(observation) = observation_for_tool_use(input, config) else {
                return Ok(HookOutput::proceed());
            };
            let store = handle.get().await?;
            let id = store.remember(observation).await?;
            tracing::debug!(frame_id = %id, "captured tool output");
            Ok(HookOutput::proceed())
        }
        HookEvent::Stop => {
            let store = handle.get().await?;
            save_session(&store, input).await?;
            Ok(HookOutput::proceed())
        }
    }
}

fn read_stdin() -> String {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return String::new();
    }
    let mut buffer = String::new();
    if let Err(error) = stdin.read_to_string(&mut buffer) {
        tracing::debug!(%error, "failed to read hook input");
    }
    buffer
}

pub fn parse_hook_input(raw: &str) -> HookInput {
    if raw.trim().is_empty() {
        return HookInput::default();
    }
    serde_json::from_str(raw).unwrap_or_else(|error| {
        tracing::debug!(%error, "ignoring malformed hook input");
        HookInput::default()
    })
}

/// Build the observation for a finished tool call, or `None` when the call
/// is not worth remembering.
pub fn observation_for_tool_use(input: &HookInput, config: &MindConfig) -> Option<ObservationInput> {
    let tool = input.tool_name.as_deref().map(str::trim).filter(|tool| !tool.is_empty())?;
    if SKIPPED_TOOLS.contains(&tool.to_ascii_lowercase().as_str()) {
        return None;
    }
    let output = response_text(&input.tool_response);
    if output.trim().is_empty() {
        return None;
    }

    let obs_type = classify(tool, &output);
    let mut metadata = Metadata::new();
    let content = if config.auto_compress {
        let compressed = compress(tool, &input.tool_input, &output);
        metadata.insert(
            "original_size".to_string(),
            MetadataValue::from(compressed.original_size),
        );
        metadata.insert(
            "compressed".to_string(),
            MetadataValue::from(compressed.was_compressed),
        );
        compressed.compressed
    } else {
        output.clone()
    };
    if let Some(host_session) = &input.session_id {
        metadata.insert(
            HOST_SESSION_KEY.to_string(),
            MetadataValue::from(host_session.as_str()),
        );
    }
    if let Some(path) = input_path(&input.tool_input) {
        metadata.insert("file_path".to_string(), MetadataValue::from(path));
    }

    let summary = tool_summary(tool, &input.tool_input, &output);
    Some(
        ObservationInput::new(obs_type, summary, content)
            .with_tool(tool)
            .with_metadata(metadata),
    )
}

/// Text of a tool response, whichever shape the host sent it in.
pub fn response_text(response: &Value) -> String {
    match response {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(fields) => {
            if fields.contains_key("stdout") || fields.contains_key("stderr") {
                let streams: Vec<&str> = ["stdout", "stderr"]
                    .iter()
                    .filter_map(|key| fields.get(*key).and_then(Value::as_str))
                    .filter(|text| !text.is_empty())
                    .collect();
                return streams.join("\n");
            }
            ["output", "content", "result"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .or_else(|| {
                    response
                        .pointer("/file/content")
                        .and_then(Value::as_str)
                })
                .map(str::to_string)
                .unwrap_or_else(|| response.to_string())
        }
        other => other.to_string(),
    }
}

fn input_path(input: &Value) -> Option<&str> {
    ["file_path", "notebook_path", "path"]
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .filter(|path| !path.trim().is_empty())
}

fn input_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// One-line description of a tool call.
pub fn tool_summary(tool: &str, input: &Value, output: &str) -> String {
    let lower = tool.to_ascii_lowercase();
    let file_name = input_path(input).map(|path| {
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    });

    let summary = match (lower.as_str(), file_name) {
        ("read" | "notebookread", Some(name)) => format!("Read {name}"),
        ("edit" | "multiedit" | "notebookedit", Some(name)) => format!("Edited {name}"),
        ("write", Some(name)) => format!("Wrote {name}"),
        ("bash" | "shell", _) => match input_field(input, "command") {
            Some(command) => format!("Ran: {}", command.lines().next().unwrap_or_default()),
            None => "Ran a command".to_string(),
        },
        ("grep" | "search", _) => match input_field(input, "pattern") {
            Some(pattern) => format!("Searched for {pattern}"),
            None => "Searched the project".to_string(),
        },
        ("glob", _) => match input_field(input, "pattern") {
            Some(pattern) => format!("Listed files matching {pattern}"),
            None => "Listed files".to_string(),
        },
        (_, Some(name)) => format!("{tool} {name}"),
        (_, None) => {
            let first = output
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_default();
            format!("{tool}: {first}")
        }
    };
    truncate_chars(&summary, SUMMARY_MAX_CHARS)
}

async fn save_session(store: &MindStore, input: &HookInput) -> Result<()> {
    let cwd = match &input.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    let files_modified = git_changes::changed_files(&cwd).await;

    let context = store.get_context(None).await?;
    let session_id = input
        .session_id
        .clone()
        .unwrap_or_else(|| store.session_id().to_string());
    let observations: Vec<Observation> = context
        .recent_observations
        .into_iter()
        .filter(|observation| observation.obs_type != ObservationType::Session)
        .filter(|observation| match &input.session_id {
            Some(host) => {
                observation
                    .metadata
                    .get(HOST_SESSION_KEY)
                    .and_then(MetadataValue::as_str)
                    == Some(host.as_str())
            }
            None => {
                observation
                    .metadata
                    .get(mind_memory::SESSION_ID_KEY)
                    .and_then(MetadataValue::as_str)
                    == Some(store.session_id())
            }
        })
        .collect();

    if observations.is_empty() && files_modified.is_empty() {
        tracing::debug!(session_id = %session_id, "nothing to summarize");
        return Ok(());
    }

    let summary = build_session_summary(
        session_id,
        &observations,
        files_modified,
        chrono::Utc::now().timestamp_millis(),
    );
    store.save_session_summary(&summary).await?;
    Ok(())
}

pub fn build_session_summary(
    id: String,
    observations: &[Observation],
    files_modified: Vec<String>,
    now_ms: i64,
) -> SessionSummary {
    let start_time = observations
        .iter()
        .map(|observation| observation.timestamp)
        .min()
        .unwrap_or(now_ms);

    let mut by_type: BTreeMap<ObservationType, usize> = BTreeMap::new();
    for observation in observations {
        *by_type.entry(observation.obs_type).or_default() += 1;
    }
    let key_decisions: Vec<String> = observations
        .iter()
        .filter(|observation| observation.obs_type == ObservationType::Decision)
        .map(|observation| observation.summary.clone())
        .take(KEY_DECISIONS_MAX)
        .collect();

    let mut summary = format!("Session with {} observations", observations.len());
    if !by_type.is_empty() {
        let breakdown: Vec<String> = by_type
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        summary.push_str(&format!(" ({})", breakdown.join(", ")));
    }
    summary.push_str(&format!("; {} files modified", files_modified.len()));

    SessionSummary {
        id,
        start_time,
        end_time: now_ms,
        observation_count: observations.len(),
        key_decisions,
        files_modified,
        summary,
    }
}

#[cfg(test)]
#[path = "hook_cmd_tests.rs"]
mod tests;
