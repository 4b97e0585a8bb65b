//! Storage engine boundary.
//!
//! The store never touches the memory file's format directly: it hands
//! frames to a [`MemoryEngine`] and reads frames back. Engines are opened
//! and created through a [`MemoryBackend`], which is what recovery talks to.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mind_core::Metadata;
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 120;

/// Storage profile requested at create/open time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Basic,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
        }
    }
}

/// A frame as handed to [`MemoryEngine::put`].
#[derive(Debug, Clone, Default)]
pub struct PutFrame {
    pub title: String,
    pub label: String,
    pub text: String,
    pub metadata: Metadata,
    pub tags: Vec<String>,
}

/// A stored frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: u64,
    /// Seconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Frame {
    /// Leading slice of the text for listings.
    pub fn preview(&self) -> String {
        self.text.chars().take(PREVIEW_CHARS).collect()
    }
}

/// A frame matched by [`MemoryEngine::find`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHit {
    pub frame: Frame,
    pub score: f64,
    pub snippet: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Term matching over title and text.
    #[default]
    Lex,
    /// Engine's choice. Engines without a semantic index search lexically.
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FindOptions {
    pub k: usize,
    pub mode: SearchMode,
}

impl FindOptions {
    pub fn lexical(k: usize) -> Self {
        Self {
            k,
            mode: SearchMode::Lex,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimelineOptions {
    pub limit: Option<usize>,
    /// Newest first.
    pub reverse: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frame_count: u64,
    pub size_bytes: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold a readable memory store. The
    /// reason text is what corruption detection inspects.
    #[error("{reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// An open memory file.
///
/// Implementations must not cache frames across calls: other processes
/// append to the same file between the store's locked sections.
#[async_trait]
pub trait MemoryEngine: Send + Sync {
    async fn put(&self, frame: PutFrame) -> Result<u64, EngineError>;

    async fn find(&self, query: &str, options: FindOptions) -> Result<Vec<FrameHit>, EngineError>;

    /// Answer text built from at most `options.k` matches, `None` when
    /// nothing matches.
    async fn ask(&self, question: &str, options: FindOptions)
    -> Result<Option<String>, EngineError>;

    async fn timeline(&self, options: TimelineOptions) -> Result<Vec<Frame>, EngineError>;

    async fn stats(&self) -> Result<EngineStats, EngineError>;
}

/// Creates and opens engines for a memory file path.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Create an empty store at `path`, replacing whatever is there.
    async fn create(
        &self,
        path: &Path,
        profile: Profile,
    ) -> Result<Box<dyn MemoryEngine>, EngineError>;

    /// Open and validate an existing store.
    async fn open(&self, profile: Profile, path: &Path)
    -> Result<Box<dyn MemoryEngine>, EngineError>;
}
