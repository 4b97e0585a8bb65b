use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Utc;
use mind_config::{ConfigOverrides, MindConfig};
use mind_core::{
    InjectedContext, Metadata, MetadataValue, MindStats, Observation, ObservationInput,
    ObservationType, SearchResult, SessionSummary,
};
use mind_lock::{LockOptions, sidecar_path};
use ulid::Ulid;

use crate::engine::{
    FindOptions, Frame, MemoryBackend, MemoryEngine, PutFrame, TimelineOptions,
};
use crate::error::{MindError, Result};
use crate::frame_file::FrameFileBackend;
use crate::recovery::{self, MAX_BACKUPS};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Matches an `ask` answer is built from.
pub const ASK_MATCHES: usize = 5;
/// Query matches added to context as relevant memories.
pub const CONTEXT_MATCHES: usize = 10;
pub const NO_ANSWER: &str = "No relevant memories found.";

pub const SESSION_ID_KEY: &str = "session_id";
const OBSERVATION_ID_KEY: &str = "observation_id";
const OBSERVATION_TYPE_KEY: &str = "observation_type";
const TIMESTAMP_KEY: &str = "timestamp";
const TOOL_KEY: &str = "tool";
/// Frame metadata keys that mirror observation fields rather than caller metadata.
const RESERVED_KEYS: [&str; 4] = [OBSERVATION_ID_KEY, OBSERVATION_TYPE_KEY, TIMESTAMP_KEY, TOOL_KEY];

/// Timestamps below this are taken to be seconds, not milliseconds.
const SECONDS_THRESHOLD: i64 = 10_000_000_000;
const SESSION_TITLE_CHARS: usize = 100;

/// Facade over one memory file.
///
/// Every operation runs inside the sidecar lock, reads included, so other
/// processes appending to the same file are fully serialized with this one.
pub struct MindStore {
    config: MindConfig,
    engine: Box<dyn MemoryEngine>,
    lock_path: PathBuf,
    lock_options: LockOptions,
    session_id: String,
    initialized: bool,
}

impl std::fmt::Debug for MindStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindStore")
            .field("memory_path", &self.config.memory_path)
            .field("session_id", &self.session_id)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl MindStore {
    /// Resolve configuration from the environment and open the default
    /// file-backed store.
    pub async fn open(overrides: &ConfigOverrides) -> Result<Self> {
        let config = MindConfig::load(overrides).map_err(MindError::Config)?;
        Self::open_with(config, &FrameFileBackend).await
    }

    pub async fn open_with(config: MindConfig, backend: &dyn MemoryBackend) -> Result<Self> {
        Self::open_with_lock_options(config, backend, LockOptions::default()).await
    }

    /// Open `config.memory_path`, recovering from corruption, then prune old
    /// backups.
    pub async fn open_with_lock_options(
        config: MindConfig,
        backend: &dyn MemoryBackend,
        lock_options: LockOptions,
    ) -> Result<Self> {
        let memory_path = config.memory_path.clone();
        if let Some(parent) = memory_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| MindError::io(parent, err))?;
        }

        let lock_path = sidecar_path(&memory_path);
        let engine = mind_lock::with_lock(&lock_path, &lock_options, || {
            recovery::open_or_recover(backend, &memory_path)
        })
        .await?;

        recovery::prune_backups(&memory_path, MAX_BACKUPS);

        let session_id = Ulid::new().to_string();
        tracing::debug!(
            path = %memory_path.display(),
            session_id = %session_id,
            "memory store opened"
        );

        Ok(Self {
            config,
            engine,
            lock_path,
            lock_options,
            session_id,
            initialized: true,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn memory_path(&self) -> &Path {
        &self.config.memory_path
    }

    pub fn config(&self) -> &MindConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn locked<T, F, Fut>(&self, critical_section: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        mind_lock::with_lock(&self.lock_path, &self.lock_options, critical_section).await
    }

    /// Store an observation and return the engine-assigned frame id.
    pub async fn remember(&self, input: ObservationInput) -> Result<String> {
        let mut metadata = input.metadata.unwrap_or_default();
        metadata.insert(
            SESSION_ID_KEY.to_string(),
            MetadataValue::from(self.session_id.as_str()),
        );
        let observation = Observation {
            id: Ulid::new().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            obs_type: input.obs_type,
            tool: input.tool,
            summary: input.summary,
            content: input.content,
            metadata,
        };
        let frame = observation_frame(&observation);

        let frame_id = self
            .locked(|| async { Ok(self.engine.put(frame).await?) })
            .await?;

        tracing::debug!(
            frame_id,
            observation_id = %observation.id,
            obs_type = observation.obs_type.as_str(),
            "remembered observation"
        );
        Ok(frame_id.to_string())
    }

    /// Lexical search, best match first. `limit` defaults to
    /// [`DEFAULT_SEARCH_LIMIT`].
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchResult>> {
        let k = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let hits = self
            .locked(|| async { Ok(self.engine.find(query, FindOptions::lexical(k)).await?) })
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                observation: observation_from_frame(&hit.frame),
                score: hit.score,
                snippet: hit.snippet,
            })
            .collect())
    }

    /// Engine answer over the best [`ASK_MATCHES`] matches, or [`NO_ANSWER`].
    pub async fn ask(&self, question: &str) -> Result<String> {
        let answer = self
            .locked(|| async {
                Ok(self
                    .engine
                    .ask(question, FindOptions::lexical(ASK_MATCHES))
                    .await?)
            })
            .await?;
        Ok(answer.unwrap_or_else(|| NO_ANSWER.to_string()))
    }

    /// Recent observations within the token budget, plus query matches.
    pub async fn get_context(&self, query: Option<&str>) -> Result<InjectedContext> {
        let query = query.map(str::trim).filter(|query| !query.is_empty());
        let timeline_options = TimelineOptions {
            limit: Some(self.config.max_context_observations),
            reverse: true,
        };

        let (recent_frames, relevant_hits) = self
            .locked(|| async {
                let recent = self.engine.timeline(timeline_options).await?;
                let relevant = match query {
                    Some(query) => {
                        self.engine
                            .find(query, FindOptions::lexical(CONTEXT_MATCHES))
                            .await?
                    }
                    None => Vec::new(),
                };
                Ok((recent, relevant))
            })
            .await?;

        let (recent_observations, token_count) = fit_token_budget(
            recent_frames.iter().map(observation_from_frame),
            self.config.max_context_tokens,
        );
        let relevant_memories = relevant_hits
            .iter()
            .map(|hit| observation_from_frame(&hit.frame))
            .collect();

        Ok(InjectedContext {
            recent_observations,
            relevant_memories,
            session_summaries: Vec::new(),
            token_count,
        })
    }

    /// Store a session summary as JSON text, bypassing compression.
    pub async fn save_session_summary(&self, summary: &SessionSummary) -> Result<String> {
        let text = serde_json::to_string(summary).map_err(|source| MindError::Serialization {
            what: "session summary",
            source,
        })?;
        let frame = session_frame(summary, &self.session_id, text);

        let frame_id = self
            .locked(|| async { Ok(self.engine.put(frame).await?) })
            .await?;

        tracing::debug!(frame_id, session_id = %summary.id, "saved session summary");
        Ok(frame_id.to_string())
    }

    pub async fn stats(&self) -> Result<MindStats> {
        let (engine_stats, frames) = self
            .locked(|| async {
                let stats = self.engine.stats().await?;
                let frames = self.engine.timeline(TimelineOptions::default()).await?;
                Ok((stats, frames))
            })
            .await?;

        let observations: Vec<Observation> = frames.iter().map(observation_from_frame).collect();
        let sessions: BTreeSet<&str> = observations
            .iter()
            .filter_map(|observation| observation.metadata.get(SESSION_ID_KEY))
            .filter_map(MetadataValue::as_str)
            .collect();
        let mut observations_by_type: BTreeMap<ObservationType, usize> = BTreeMap::new();
        for observation in &observations {
            *observations_by_type.entry(observation.obs_type).or_default() += 1;
        }

        Ok(MindStats {
            total_observations: engine_stats.frame_count,
            total_sessions: sessions.len(),
            oldest_memory: observations.first().map(|observation| observation.timestamp),
            newest_memory: observations.last().map(|observation| observation.timestamp),
            file_size: engine_stats.size_bytes,
            observations_by_type,
        })
    }
}

fn observation_frame(observation: &Observation) -> PutFrame {
    let mut metadata = observation.metadata.clone();
    metadata.insert(
        OBSERVATION_ID_KEY.to_string(),
        MetadataValue::from(observation.id.as_str()),
    );
    metadata.insert(
        OBSERVATION_TYPE_KEY.to_string(),
        MetadataValue::from(observation.obs_type.as_str()),
    );
    metadata.insert(
        TIMESTAMP_KEY.to_string(),
        MetadataValue::from(observation.timestamp),
    );

    let mut tags = vec![observation.obs_type.as_str().to_string()];
    if let Some(tool) = &observation.tool {
        metadata.insert(TOOL_KEY.to_string(), MetadataValue::from(tool.as_str()));
        tags.push(tool.clone());
    }

    PutFrame {
        title: format!("[{}] {}", observation.obs_type, observation.summary),
        label: observation.obs_type.as_str().to_string(),
        text: observation.content.clone(),
        metadata,
        tags,
    }
}

fn session_frame(summary: &SessionSummary, store_session_id: &str, text: String) -> PutFrame {
    let headline: String = summary
        .summary
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(SESSION_TITLE_CHARS)
        .collect();

    let mut metadata = Metadata::new();
    metadata.insert(
        SESSION_ID_KEY.to_string(),
        MetadataValue::from(store_session_id),
    );
    metadata.insert(
        OBSERVATION_TYPE_KEY.to_string(),
        MetadataValue::from(ObservationType::Session.as_str()),
    );
    metadata.insert(TIMESTAMP_KEY.to_string(), MetadataValue::from(summary.end_time));
    metadata.insert(
        "observation_count".to_string(),
        MetadataValue::from(summary.observation_count),
    );
    metadata.insert(
        "files_modified".to_string(),
        MetadataValue::from(summary.files_modified.len()),
    );

    PutFrame {
        title: format!("[{}] {headline}", ObservationType::Session),
        label: ObservationType::Session.as_str().to_string(),
        text,
        metadata,
        tags: vec![ObservationType::Session.as_str().to_string()],
    }
}

/// Rebuild an observation from a stored frame, falling back to frame fields
/// when the observation metadata is missing.
pub(crate) fn observation_from_frame(frame: &Frame) -> Observation {
    let metadata = &frame.metadata;
    let id = metadata
        .get(OBSERVATION_ID_KEY)
        .and_then(MetadataValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| frame.frame_id.to_string());
    let obs_type = metadata
        .get(OBSERVATION_TYPE_KEY)
        .and_then(MetadataValue::as_str)
        .and_then(|kind| kind.parse().ok())
        .or_else(|| frame.label.parse().ok())
        .unwrap_or(ObservationType::Discovery);
    let timestamp = metadata
        .get(TIMESTAMP_KEY)
        .and_then(MetadataValue::as_i64)
        .unwrap_or(frame.created_at);
    let tool = metadata
        .get(TOOL_KEY)
        .and_then(MetadataValue::as_str)
        .map(str::to_string);

    let caller_metadata = metadata
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Observation {
        id,
        timestamp: normalize_timestamp(timestamp),
        obs_type,
        tool,
        summary: title_summary(&frame.title),
        content: frame.text.clone(),
        metadata: caller_metadata,
    }
}

/// Summary part of a `[type] summary` title; empty for other titles.
fn title_summary(title: &str) -> String {
    title
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(_, summary)| summary.trim_start().to_string())
        .unwrap_or_default()
}

pub(crate) fn normalize_timestamp(timestamp: i64) -> i64 {
    if timestamp < SECONDS_THRESHOLD {
        timestamp.saturating_mul(1000)
    } else {
        timestamp
    }
}

/// Rough token count of an observation's headline: one token per four chars.
pub(crate) fn estimate_tokens(observation: &Observation) -> usize {
    let headline = format!("[{}] {}", observation.obs_type, observation.summary);
    headline.chars().count().div_ceil(4)
}

/// Take observations in order until the next one would overflow `budget`.
fn fit_token_budget(
    observations: impl IntoIterator<Item = Observation>,
    budget: usize,
) -> (Vec<Observation>, usize) {
    let mut kept = Vec::new();
    let mut total = 0;
    for observation in observations {
        let tokens = estimate_tokens(&observation);
        if total + tokens > budget {
            break;
        }
        total += tokens;
        kept.push(observation);
    }
    (kept, total)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
