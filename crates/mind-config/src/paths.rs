//! Project root discovery and the optional per-project config file.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigOverrides;

/// Environment variable the host sets to the project being worked on.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";
/// Set to `1` or `true` to force debug logging.
pub const DEBUG_ENV: &str = "MIND_DEBUG";
/// Optional overrides file, relative to the project root.
pub const CONFIG_FILE: &str = ".claude/mind.toml";

/// Project root from the host-provided directory, else the working directory.
pub fn resolve_project_root(project_dir: Option<&str>, cwd: &Path) -> PathBuf {
    match project_dir.map(str::trim) {
        Some(dir) if !dir.is_empty() => {
            let dir = PathBuf::from(dir);
            if dir.is_absolute() { dir } else { cwd.join(dir) }
        }
        _ => cwd.to_path_buf(),
    }
}

pub(crate) fn debug_requested(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Read `<project_root>/.claude/mind.toml` if present.
///
/// A missing file yields empty overrides; a malformed file is an error so a
/// typo does not silently redirect the memory file.
pub fn load_file_overrides(project_root: &Path) -> Result<ConfigOverrides> {
    let path = project_root.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigOverrides::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
