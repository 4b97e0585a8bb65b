use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

/// Memory file location relative to the project root.
pub const DEFAULT_MEMORY_PATH: &str = ".claude/mind.mv2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindConfig {
    /// Memory file. Relative paths are resolved against the project root.
    pub memory_path: PathBuf,
    /// Upper bound on recent observations pulled into a context bundle.
    pub max_context_observations: usize,
    /// Token budget for the recent observations of a context bundle.
    pub max_context_tokens: usize,
    /// Compress tool output before it is remembered.
    pub auto_compress: bool,
    /// Reserved for score filtering by engines that report calibrated scores.
    pub min_confidence: f64,
    pub debug: bool,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
            max_context_observations: 20,
            max_context_tokens: 2000,
            auto_compress: true,
            min_confidence: 0.6,
            debug: false,
        }
    }
}

/// Partial configuration. Every field left as `None` keeps the value it is
/// merged onto.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub memory_path: Option<PathBuf>,
    pub max_context_observations: Option<usize>,
    pub max_context_tokens: Option<usize>,
    pub auto_compress: Option<bool>,
    pub min_confidence: Option<f64>,
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    /// Layer `higher` on top of `self`; values set in `higher` win.
    pub fn merge(self, higher: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            memory_path: higher.memory_path.or(self.memory_path),
            max_context_observations: higher
                .max_context_observations
                .or(self.max_context_observations),
            max_context_tokens: higher.max_context_tokens.or(self.max_context_tokens),
            auto_compress: higher.auto_compress.or(self.auto_compress),
            min_confidence: higher.min_confidence.or(self.min_confidence),
            debug: higher.debug.or(self.debug),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }
}

impl MindConfig {
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(path) = &overrides.memory_path {
            self.memory_path = path.clone();
        }
        if let Some(value) = overrides.max_context_observations {
            self.max_context_observations = value;
        }
        if let Some(value) = overrides.max_context_tokens {
            self.max_context_tokens = value;
        }
        if let Some(value) = overrides.auto_compress {
            self.auto_compress = value;
        }
        if let Some(value) = overrides.min_confidence {
            self.min_confidence = value;
        }
        if let Some(value) = overrides.debug {
            self.debug = value;
        }
        self
    }

    /// Build the effective configuration for the environment's project root.
    ///
    /// Precedence, lowest first: defaults, `.claude/mind.toml`, `overrides`,
    /// then `MIND_DEBUG`.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_dir = std::env::var(paths::PROJECT_DIR_ENV).ok();
        let project_root = paths::resolve_project_root(project_dir.as_deref(), &cwd);
        let debug_env = std::env::var(paths::DEBUG_ENV).ok();

        let mut config = Self::resolve_in(&project_root, overrides)?;
        if paths::debug_requested(debug_env.as_deref()) {
            config.debug = true;
        }
        Ok(config)
    }

    /// Resolve against an explicit project root without consulting the
    /// process environment.
    pub fn resolve_in(project_root: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let file_overrides = paths::load_file_overrides(project_root)?;
        let merged = file_overrides.merge(overrides.clone());

        let mut config = Self::default().with_overrides(&merged);
        if config.memory_path.is_relative() {
            config.memory_path = project_root.join(&config.memory_path);
        }
        config.validate()?;

        tracing::debug!(
            memory_path = %config.memory_path.display(),
            max_context_observations = config.max_context_observations,
            max_context_tokens = config.max_context_tokens,
            auto_compress = config.auto_compress,
            "resolved mind config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_path.as_os_str().is_empty() {
            bail!("memory_path must not be empty");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
