//! Deterministic classification and compression of captured tool output.
//!
//! Both halves are pure: no I/O, no clock, no failure path. Every parse
//! assumption has a fallback so a hook can always record something.

mod classify;
mod compress;
mod patterns;
mod summarize;

pub use classify::classify;
pub use compress::{
    COMPRESSION_THRESHOLD, CompressedOutput, TARGET_CEILING, TRUNCATION_MARKER, compress,
    truncate_chars,
};
