//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration for a game session. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of manual slots, indexed `0..manual_slot_count`.
    pub manual_slot_count: usize,

    /// Size of the rotating auto-save set.
    pub auto_slot_count: usize,

    pub autosave_enabled: bool,

    /// Require unlock conditions to still hold when checking availability.
    pub recheck_unlock_conditions: bool,

    /// Directory for save files. In-memory storage when unset.
    pub save_dir: Option<PathBuf>,

    /// Story dataset file. The embedded dataset when unset.
    pub story_data: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            manual_slot_count: 10,
            auto_slot_count: 3,
            autosave_enabled: true,
            recheck_unlock_conditions: false,
            save_dir: None,
            story_data: None,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
