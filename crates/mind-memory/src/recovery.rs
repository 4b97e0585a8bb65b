//! Open-or-create with backup rotation.
//!
//! Runs inside the store's lock. A file that is too large or that the engine
//! rejects with a corruption signature is renamed aside to
//! `<path>.backup-<epoch-ms>` and replaced by an empty store. Pruning runs
//! after the lock is released and keeps the newest [`MAX_BACKUPS`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{EngineError, MemoryBackend, MemoryEngine, Profile};
use crate::error::{MindError, Result};

/// Files larger than this are backed up without being parsed.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const MAX_BACKUPS: usize = 3;

const BACKUP_INFIX: &str = ".backup-";

/// A family of engine messages that mean "the file is unreadable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorruptionSignature {
    pub name: &'static str,
    needles: &'static [&'static str],
}

/// Matched case-insensitively as substrings of the engine's error message.
pub const CORRUPTION_SIGNATURES: &[CorruptionSignature] = &[
    CorruptionSignature {
        name: "deserialization",
        needles: &["deserializ"],
    },
    CorruptionSignature {
        name: "unexpected-variant",
        needles: &["unexpected variant", "unknown variant"],
    },
    CorruptionSignature {
        name: "invalid",
        needles: &["invalid"],
    },
    CorruptionSignature {
        name: "corrupt",
        needles: &["corrupt"],
    },
    CorruptionSignature {
        name: "validation",
        needles: &["validation failed", "failed validation", "failed to validate"],
    },
    CorruptionSignature {
        name: "unrecoverable",
        needles: &["unrecoverable", "unable to recover"],
    },
    CorruptionSignature {
        name: "missing-toc",
        needles: &["table of contents", "missing toc"],
    },
];

/// First signature found in `message`, if any.
pub fn corruption_signature(message: &str) -> Option<&'static CorruptionSignature> {
    let lower = message.to_lowercase();
    CORRUPTION_SIGNATURES.iter().find(|signature| {
        signature
            .needles
            .iter()
            .any(|needle| lower.contains(needle))
    })
}

/// Message text of an open failure, without the path, which could contain
/// signature words on its own.
fn failure_message(err: &EngineError) -> String {
    match err {
        EngineError::Io { source, .. } => source.to_string(),
        EngineError::Format { reason, .. } => reason.clone(),
        EngineError::Encode(source) => source.to_string(),
    }
}

pub fn backup_path(path: &Path, epoch_ms: i64) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!("{BACKUP_INFIX}{epoch_ms}"));
    PathBuf::from(name)
}

/// Epoch embedded in a sibling backup name of `base_name`.
fn backup_epoch(base_name: &str, candidate: &str) -> Option<u64> {
    let digits = candidate.strip_prefix(base_name)?.strip_prefix(BACKUP_INFIX)?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Backups of `path`, newest first.
pub fn list_backups(path: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(base_name)) = (path.parent(), path.file_name()) else {
        return Vec::new();
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let base_name = base_name.to_string_lossy();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(dir = %dir.display(), %error, "cannot list memory backups");
            return Vec::new();
        }
    };

    let mut backups: Vec<(u64, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let epoch = backup_epoch(&base_name, &name.to_string_lossy())?;
            Some((epoch, entry.path()))
        })
        .collect();
    backups.sort_by(|a, b| b.0.cmp(&a.0));
    backups.into_iter().map(|(_, path)| path).collect()
}

/// Delete all but the newest `keep` backups of `path`. Returns how many were
/// removed; individual failures are logged and skipped.
pub fn prune_backups(path: &Path, keep: usize) -> usize {
    let mut removed = 0;
    for stale in list_backups(path).into_iter().skip(keep) {
        match fs::remove_file(&stale) {
            Ok(()) => removed += 1,
            Err(error) => {
                tracing::debug!(path = %stale.display(), %error, "failed to prune memory backup");
            }
        }
    }
    if removed > 0 {
        tracing::debug!(path = %path.display(), removed, "pruned memory backups");
    }
    removed
}

/// Move `path` aside. With `delete_fallback`, a failed rename deletes the
/// file instead so a fresh store can take its place.
fn back_up(path: &Path, delete_fallback: bool) -> Result<Option<PathBuf>> {
    let mut epoch_ms = chrono::Utc::now().timestamp_millis();
    let mut backup = backup_path(path, epoch_ms);
    // Two recoveries within one millisecond must not overwrite each other.
    while backup.exists() {
        epoch_ms += 1;
        backup = backup_path(path, epoch_ms);
    }
    match fs::rename(path, &backup) {
        Ok(()) => {
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                "moved memory file aside"
            );
            Ok(Some(backup))
        }
        Err(error) if delete_fallback => {
            tracing::warn!(path = %path.display(), %error, "backup rename failed; deleting memory file");
            fs::remove_file(path).map_err(|err| MindError::io(path, err))?;
            Ok(None)
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "backup rename failed");
            Ok(None)
        }
    }
}

/// Open the store at `path`, creating or replacing it as needed.
///
/// Caller holds the lock. Errors that carry no corruption signature, and
/// failures to create the fresh store, propagate.
pub async fn open_or_recover(
    backend: &dyn MemoryBackend,
    path: &Path,
) -> Result<Box<dyn MemoryEngine>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "creating memory file");
            return Ok(backend.create(path, Profile::Basic).await?);
        }
        Err(err) => return Err(MindError::io(path, err)),
    };

    if metadata.len() > MAX_FILE_SIZE {
        let oversized = MindError::OversizedStore {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        };
        tracing::warn!(error = %oversized, "replacing oversized memory file");
        back_up(path, false)?;
        return Ok(backend.create(path, Profile::Basic).await?);
    }

    match backend.open(Profile::Basic, path).await {
        Ok(engine) => Ok(engine),
        Err(err) => {
            let message = failure_message(&err);
            let Some(signature) = corruption_signature(&message) else {
                return Err(err.into());
            };
            let corrupt = MindError::CorruptStore {
                path: path.to_path_buf(),
                reason: message,
            };
            tracing::warn!(error = %corrupt, signature = signature.name, "recovering corrupt memory file");
            back_up(path, true)?;
            Ok(backend.create(path, Profile::Basic).await?)
        }
    }
}
