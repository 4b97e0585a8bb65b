//! Memory store configuration: defaults, overrides, and path resolution.

pub mod config;
pub mod paths;

pub use config::{ConfigOverrides, DEFAULT_MEMORY_PATH, MindConfig};
pub use paths::{
    CONFIG_FILE, DEBUG_ENV, PROJECT_DIR_ENV, load_file_overrides, resolve_project_root,
};
