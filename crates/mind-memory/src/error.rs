use std::path::PathBuf;

use mind_lock::LockError;

use crate::engine::EngineError;

/// Errors surfaced by [`crate::MindStore`].
///
/// `CorruptStore` and `OversizedStore` describe conditions that `open`
/// repairs by backing the file up; they only reach callers through logs and
/// the recovery helpers.
#[derive(thiserror::Error, Debug)]
pub enum MindError {
    #[error("Timed out acquiring memory lock {} after {attempts} attempts", path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("Memory file {} is corrupt: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Memory file {} is {size} bytes, over the {limit} byte limit", path.display())]
    OversizedStore { path: PathBuf, size: u64, limit: u64 },

    #[error("Memory engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0:#}")]
    Config(anyhow::Error),
}

impl MindError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Lock contention outlasted the retry budget. Hooks skip the operation
    /// and carry on.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

impl From<LockError> for MindError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { path, attempts } => Self::LockTimeout { path, attempts },
            LockError::Io { path, source } => Self::Io { path, source },
        }
    }
}

pub type Result<T, E = MindError> = std::result::Result<T, E>;
