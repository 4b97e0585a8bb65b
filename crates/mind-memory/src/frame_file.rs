//! Single-file JSONL engine.
//!
//! Layout: one header line `{"magic":"MIND","version":1,"profile":"basic"}`
//! followed by one JSON [`Frame`] per line. Appends are a single `write` of
//! one line, so a crash can at worst leave a torn last line, which readers
//! skip. Every call re-reads the file; the lock held by the store is what
//! makes read-modify-append sequences safe across processes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{
    EngineError, EngineStats, FindOptions, Frame, FrameHit, MemoryBackend, MemoryEngine, Profile,
    PutFrame, TimelineOptions,
};

const MAGIC: &str = "MIND";
const FORMAT_VERSION: u32 = 1;
const SNIPPET_CHARS: usize = 80;
const SNIPPET_LEAD_CHARS: usize = 30;
const PHRASE_BONUS: f64 = 1.0;

#[derive(Debug, Serialize, Deserialize)]
struct FileHeader {
    magic: String,
    version: u32,
    profile: Profile,
}

/// [`MemoryBackend`] for [`FrameFile`] stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameFileBackend;

#[async_trait]
impl MemoryBackend for FrameFileBackend {
    async fn create(
        &self,
        path: &Path,
        profile: Profile,
    ) -> Result<Box<dyn MemoryEngine>, EngineError> {
        Ok(Box::new(FrameFile::create(path, profile)?))
    }

    async fn open(
        &self,
        profile: Profile,
        path: &Path,
    ) -> Result<Box<dyn MemoryEngine>, EngineError> {
        Ok(Box::new(FrameFile::open(profile, path)?))
    }
}

#[derive(Debug, Clone)]
pub struct FrameFile {
    path: PathBuf,
    profile: Profile,
}

/// Frames read from disk plus what an append needs to know.
struct Snapshot {
    frames: Vec<Frame>,
    trailing_newline: bool,
}

impl FrameFile {
    pub fn create(path: &Path, profile: Profile) -> Result<Self, EngineError> {
        let header = FileHeader {
            magic: MAGIC.to_string(),
            version: FORMAT_VERSION,
            profile,
        };
        let line = serde_json::to_string(&header)?;

        let mut file = File::create(path).map_err(|err| EngineError::io(path, err))?;
        set_file_mode_600(path)?;
        writeln!(file, "{line}").map_err(|err| EngineError::io(path, err))?;
        file.sync_all().map_err(|err| EngineError::io(path, err))?;

        tracing::debug!(path = %path.display(), profile = profile.as_str(), "created memory file");
        Ok(Self {
            path: path.to_path_buf(),
            profile,
        })
    }

    /// Open an existing file, validating its header.
    pub fn open(profile: Profile, path: &Path) -> Result<Self, EngineError> {
        let content = read_content(path)?;
        let stored = parse_header(path, &content)?;
        if stored != profile {
            warn!(
                path = %path.display(),
                stored = stored.as_str(),
                requested = profile.as_str(),
                "memory file profile differs from requested profile"
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            profile: stored,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let content = read_content(&self.path)?;
        parse_header(&self.path, &content)?;

        let mut frames = Vec::new();
        for (idx, line) in content.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Frame>(line) {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    warn!(
                        path = %self.path.display(),
                        line_number = idx + 1,
                        %error,
                        "skipping unreadable memory frame"
                    );
                }
            }
        }
        frames.sort_by_key(|frame| frame.frame_id);

        Ok(Snapshot {
            frames,
            trailing_newline: content.ends_with('\n'),
        })
    }

    fn lexical_hits(&self, query: &str, k: usize) -> Result<Vec<FrameHit>, EngineError> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let phrase = if terms.len() > 1 {
            phrase_regex(query)
        } else {
            None
        };

        let mut hits: Vec<FrameHit> = self
            .snapshot()?
            .frames
            .into_iter()
            .filter_map(|frame| score_frame(frame, &terms, phrase.as_ref()))
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.frame.frame_id.cmp(&a.frame.frame_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl MemoryEngine for FrameFile {
    async fn put(&self, frame: PutFrame) -> Result<u64, EngineError> {
        let snapshot = self.snapshot()?;
        let frame_id = snapshot
            .frames
            .iter()
            .map(|existing| existing.frame_id)
            .max()
            .map_or(1, |max| max + 1);

        let stored = Frame {
            frame_id,
            created_at: chrono::Utc::now().timestamp(),
            title: frame.title,
            label: frame.label,
            text: frame.text,
            metadata: frame.metadata,
            tags: frame.tags,
        };

        let mut line = String::new();
        if !snapshot.trailing_newline {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&stored)?);
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|err| EngineError::io(&self.path, err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| EngineError::io(&self.path, err))?;
        file.sync_data()
            .map_err(|err| EngineError::io(&self.path, err))?;

        Ok(frame_id)
    }

    async fn find(&self, query: &str, options: FindOptions) -> Result<Vec<FrameHit>, EngineError> {
        self.lexical_hits(query, options.k)
    }

    async fn ask(
        &self,
        question: &str,
        options: FindOptions,
    ) -> Result<Option<String>, EngineError> {
        let hits = self.lexical_hits(question, options.k)?;
        if hits.is_empty() {
            return Ok(None);
        }

        let mut answer = format!("Based on {} matching memories:", hits.len());
        for hit in &hits {
            answer.push_str("\n- ");
            answer.push_str(&hit.frame.title);
            if !hit.snippet.is_empty() {
                answer.push_str(": ");
                answer.push_str(&hit.snippet);
            }
        }
        Ok(Some(answer))
    }

    async fn timeline(&self, options: TimelineOptions) -> Result<Vec<Frame>, EngineError> {
        let mut frames = self.snapshot()?.frames;
        if options.reverse {
            frames.reverse();
        }
        if let Some(limit) = options.limit {
            frames.truncate(limit);
        }
        Ok(frames)
    }

    async fn stats(&self) -> Result<EngineStats, EngineError> {
        let frame_count = self.snapshot()?.frames.len() as u64;
        let size_bytes = fs::metadata(&self.path)
            .map_err(|err| EngineError::io(&self.path, err))?
            .len();
        Ok(EngineStats {
            frame_count,
            size_bytes,
        })
    }
}

fn read_content(path: &Path) -> Result<String, EngineError> {
    let bytes = fs::read(path).map_err(|err| EngineError::io(path, err))?;
    String::from_utf8(bytes).map_err(|err| {
        EngineError::format(
            path,
            format!(
                "invalid memory file: not UTF-8 at byte {}",
                err.utf8_error().valid_up_to()
            ),
        )
    })
}

fn parse_header(path: &Path, content: &str) -> Result<Profile, EngineError> {
    let Some(first) = content.lines().next().filter(|line| !line.trim().is_empty()) else {
        return Err(EngineError::format(
            path,
            "invalid memory file: missing header",
        ));
    };
    let header: FileHeader = serde_json::from_str(first).map_err(|err| {
        EngineError::format(path, format!("failed to deserialize header: {err}"))
    })?;
    if header.magic != MAGIC {
        return Err(EngineError::format(
            path,
            format!("invalid magic {:?}", header.magic),
        ));
    }
    if header.version != FORMAT_VERSION {
        return Err(EngineError::format(
            path,
            format!(
                "validation failed: unsupported format version {}",
                header.version
            ),
        ));
    }
    Ok(header.profile)
}

fn query_terms(query: &str) -> Vec<Regex> {
    let mut seen = Vec::new();
    let mut terms = Vec::new();
    for word in query.split_whitespace() {
        let lower = word.to_lowercase();
        if seen.contains(&lower) {
            continue;
        }
        seen.push(lower);
        terms.extend(case_insensitive(&regex::escape(word)));
    }
    terms
}

/// The whole query as one phrase, any run of whitespace between words.
fn phrase_regex(query: &str) -> Option<Regex> {
    let pattern = query
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    case_insensitive(&pattern)
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(error) => {
            warn!(%error, "dropping unmatchable search term");
            None
        }
    }
}

fn score_frame(frame: Frame, terms: &[Regex], phrase: Option<&Regex>) -> Option<FrameHit> {
    let matched = terms
        .iter()
        .filter(|term| term.is_match(&frame.title) || term.is_match(&frame.text))
        .count();
    if matched == 0 {
        return None;
    }

    let mut score = matched as f64 / terms.len() as f64;
    if phrase.is_some_and(|phrase| phrase.is_match(&frame.title) || phrase.is_match(&frame.text)) {
        score += PHRASE_BONUS;
    }

    let snippet = terms
        .iter()
        .find_map(|term| term.find(&frame.text).map(|found| (&frame.text, found.start())))
        .or_else(|| {
            terms
                .iter()
                .find_map(|term| term.find(&frame.title).map(|found| (&frame.title, found.start())))
        })
        .map(|(text, start)| snippet_around(text, start))
        .unwrap_or_default();

    Some(FrameHit {
        frame,
        score,
        snippet,
    })
}

/// About [`SNIPPET_CHARS`] characters of `text` around byte offset `start`,
/// whitespace collapsed.
fn snippet_around(text: &str, start: usize) -> String {
    let lead: Vec<usize> = text[..start].char_indices().map(|(idx, _)| idx).collect();
    let from = lead
        .len()
        .checked_sub(SNIPPET_LEAD_CHARS)
        .map_or(0, |first| lead[first]);

    let window: String = text[from..].chars().take(SNIPPET_CHARS).collect();
    let mut snippet = window.split_whitespace().collect::<Vec<_>>().join(" ");
    if from > 0 {
        snippet.insert_str(0, "...");
    }
    if text[from..].chars().count() > SNIPPET_CHARS {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|err| EngineError::io(path, err))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> Result<(), EngineError> {
    Ok(())
}

#[cfg(test)]
#[path = "frame_file_tests.rs"]
mod tests;
