//! Domain types shared by the mind crates.
//!
//! Pure data: no I/O, no locking. Everything here is serializable so it can
//! cross the storage engine boundary as frame metadata or JSON text.

pub mod metadata;
pub mod types;

pub use metadata::{Metadata, MetadataValue};
pub use types::{
    InjectedContext, MindStats, Observation, ObservationInput, ObservationType, OutputFormat,
    SearchResult, SessionSummary,
};
