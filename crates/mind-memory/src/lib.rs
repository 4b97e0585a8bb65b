//! Persistent agent memory: a lock-guarded store over a single memory file.
//!
//! [`MindStore`] is the facade hosts talk to. It opens the file through a
//! [`MemoryBackend`], replacing it with a fresh one when it is corrupt or
//! oversized, and runs every operation under the sidecar lock from
//! `mind-lock`. [`MindHandle`] shares one store per process.

pub mod engine;
mod error;
pub mod frame_file;
mod handle;
pub mod recovery;
mod store;

pub use engine::{
    EngineError, EngineStats, FindOptions, Frame, FrameHit, MemoryBackend, MemoryEngine, Profile,
    PutFrame, SearchMode, TimelineOptions,
};
pub use error::{MindError, Result};
pub use frame_file::{FrameFile, FrameFileBackend};
pub use handle::MindHandle;
pub use recovery::{MAX_BACKUPS, MAX_FILE_SIZE};
pub use store::{
    ASK_MATCHES, CONTEXT_MATCHES, DEFAULT_SEARCH_LIMIT, MindStore, NO_ANSWER, SESSION_ID_KEY,
};
