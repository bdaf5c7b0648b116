//! Configuration types.

use crate::catchup::LURKER_THRESHOLD;
use crate::engine::EngineOptions;
use crate::error::{JournalError, Result};
use crate::wizard::SUGGESTION_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the HTTP API.
pub const DEFAULT_PORT: u16 = 31995;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP API binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bujo/journal.db")
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// User every operation runs as. Unset means unauthenticated.
    #[serde(default)]
    pub user: Option<String>,

    /// Reject transitions the paper method does not allow.
    #[serde(default)]
    pub strict_transitions: bool,

    /// Reject `schedule` to a date before the task's own date.
    #[serde(default = "default_true")]
    pub reject_past_schedule: bool,

    /// Migration count at which a task is flagged as a lurker.
    #[serde(default = "default_lurker_threshold")]
    pub lurker_threshold: u32,

    /// Migration count at which the wizard suggests a task.
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: u32,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            user: None,
            strict_transitions: false,
            reject_past_schedule: true,
            lurker_threshold: default_lurker_threshold(),
            suggestion_threshold: default_suggestion_threshold(),
        }
    }
}

impl JournalConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            strict_transitions: self.strict_transitions,
            reject_past_schedule: self.reject_past_schedule,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_lurker_threshold() -> u32 {
    LURKER_THRESHOLD
}

fn default_suggestion_threshold() -> u32 {
    SUGGESTION_THRESHOLD
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Config {
    /// Load a single config file with no tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject values that would make the thresholds meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.journal.lurker_threshold == 0 {
            return Err(JournalError::Config(
                "journal.lurker_threshold must be at least 1".to_string(),
            ));
        }
        if self.journal.suggestion_threshold == 0 {
            return Err(JournalError::Config(
                "journal.suggestion_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
