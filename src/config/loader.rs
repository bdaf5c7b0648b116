//! Configuration loader with tier-based merging.

use super::merge::merge_layers;
use super::types::Config;
use crate::error::{JournalError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    User = 1,
    Project = 2,
    Explicit = 3,
    Environment = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file tier is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Directory holding the user `config.yaml`.
    pub user_dir: Option<PathBuf>,
    /// Directory holding the project `config.yaml`.
    pub project_dir: Option<PathBuf>,
    /// Single file layered above both directories.
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations, honouring `BUJO_USER_DIR`, `BUJO_PROJECT_DIR`
    /// and `BUJO_CONFIG_PATH`.
    pub fn discover() -> Self {
        let user_dir = std::env::var("BUJO_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".bujo")));

        let project_dir = std::env::var("BUJO_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("bujo")));

        let explicit_file = std::env::var("BUJO_CONFIG_PATH").ok().map(PathBuf::from);

        Self {
            user_dir,
            project_dir,
            explicit_file,
        }
    }

    pub fn with_dirs(user_dir: Option<PathBuf>, project_dir: Option<PathBuf>) -> Self {
        Self {
            user_dir,
            project_dir,
            explicit_file: None,
        }
    }

    /// An explicit `--config` path wins over `BUJO_CONFIG_PATH`.
    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.explicit_file = path;
        }
        self
    }

    fn tier_files(&self) -> Vec<(ConfigTier, PathBuf)> {
        let mut files = Vec::new();
        if let Some(ref dir) = self.user_dir {
            files.push((ConfigTier::User, dir.join("config.yaml")));
        }
        if let Some(ref dir) = self.project_dir {
            files.push((ConfigTier::Project, dir.join("config.yaml")));
        }
        if let Some(ref file) = self.explicit_file {
            files.push((ConfigTier::Explicit, file.clone()));
        }
        files
    }
}

fn read_layer(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))?;
    serde_yaml::from_str::<Value>(&content)
        .map_err(|e| JournalError::Config(format!("{}: {}", path.display(), e)))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(JournalError::Config(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with_env(paths, |name| std::env::var(name).ok())
    }

    /// Load with an injectable environment lookup.
    pub fn load_with_env<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layers = vec![serde_json::to_value(Config::default())
            .map_err(|e| JournalError::Config(e.to_string()))?];
        let mut sources = Vec::new();

        for (tier, file) in paths.tier_files() {
            if tier != ConfigTier::Explicit && !file.exists() {
                continue;
            }
            layers.push(read_layer(&file)?);
            debug!(tier = %tier, path = %file.display(), "Loaded config layer");
            sources.push((tier, file));
        }

        let mut config: Config = serde_json::from_value(merge_layers(layers))
            .map_err(|e| JournalError::Config(e.to_string()))?;
        Self::apply_env_overrides(&mut config, env)?;
        config.validate()?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    fn apply_env_overrides<F>(config: &mut Config, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = env("BUJO_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }
        if let Some(user) = env("BUJO_USER") {
            config.journal.user = Some(user);
        }
        if let Some(port) = env("BUJO_PORT") {
            config.server.port = port.trim().parse().map_err(|_| {
                JournalError::Config(format!("BUJO_PORT must be a port number, got {:?}", port))
            })?;
        }
        if let Some(strict) = env("BUJO_STRICT_TRANSITIONS") {
            config.journal.strict_transitions = parse_flag("BUJO_STRICT_TRANSITIONS", &strict)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}
