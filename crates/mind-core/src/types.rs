use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metadata::Metadata;

/// Semantic category of an observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    Discovery,
    Decision,
    Problem,
    Solution,
    Pattern,
    Warning,
    Success,
    Refactor,
    Bugfix,
    Feature,
    Session,
}

impl ObservationType {
    pub const ALL: [ObservationType; 11] = [
        Self::Discovery,
        Self::Decision,
        Self::Problem,
        Self::Solution,
        Self::Pattern,
        Self::Warning,
        Self::Success,
        Self::Refactor,
        Self::Bugfix,
        Self::Feature,
        Self::Session,
    ];

    /// Label used in frame titles (`[type] summary`) and as the frame label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Decision => "decision",
            Self::Problem => "problem",
            Self::Solution => "solution",
            Self::Pattern => "pattern",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Refactor => "refactor",
            Self::Bugfix => "bugfix",
            Self::Feature => "feature",
            Self::Session => "session",
        }
    }
}

impl std::str::FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown observation type '{s}'"))
    }
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded unit of memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Caller-supplied part of an observation; the store fills in id, timestamp
/// and session correlation.
#[derive(Debug, Clone)]
pub struct ObservationInput {
    pub obs_type: ObservationType,
    pub summary: String,
    pub content: String,
    pub tool: Option<String>,
    pub metadata: Option<Metadata>,
}

impl ObservationInput {
    pub fn new(
        obs_type: ObservationType,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            obs_type,
            summary: summary.into(),
            content: content.into(),
            tool: None,
            metadata: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A single lexical search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub observation: Observation,
    pub score: f64,
    pub snippet: String,
}

/// Summary of one process lifetime, persisted as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    /// Best effort; not reconciled against the stored frames.
    pub observation_count: usize,
    pub key_decisions: Vec<String>,
    pub files_modified: Vec<String>,
    pub summary: String,
}

/// Bundle of memories assembled for a new session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectedContext {
    pub recent_observations: Vec<Observation>,
    pub relevant_memories: Vec<Observation>,
    pub session_summaries: Vec<SessionSummary>,
    pub token_count: usize,
}

/// Aggregate view of a memory file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindStats {
    pub total_observations: u64,
    pub total_sessions: usize,
    pub oldest_memory: Option<i64>,
    pub newest_memory: Option<i64>,
    pub file_size: u64,
    pub observations_by_type: BTreeMap<ObservationType, usize>,
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
