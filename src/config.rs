//! Configuration loading.
//!
//! Settings come from an optional `config.toml`, located through
//! `VOCAB_CONFIG` or the platform config directory. Environment variables
//! override individual values.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scheduler::{PolicyError, SchedulerPolicy};

pub const APP_DIR: &str = "vocab";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_DB_NAME: &str = "vocab.db";
pub const DEFAULT_LEARNER: &str = "default";
pub const DEFAULT_SESSION_LIMIT: usize = 20;

pub const CONFIG_ENV: &str = "VOCAB_CONFIG";
pub const DB_ENV: &str = "VOCAB_DB";
pub const LEARNER_ENV: &str = "VOCAB_LEARNER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid [scheduler] settings: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerPolicy,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SESSION_LIMIT,
        }
    }
}

impl Config {
    /// Loads from the first config file found, or defaults when none exists.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Database path with priority: `VOCAB_DB` > config file > default.
    pub fn database_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var(DB_ENV) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        let dir = app_dir();
        std::fs::create_dir_all(&dir).ok();
        dir.join(DEFAULT_DB_NAME)
    }
}

/// Learner id from `VOCAB_LEARNER`, falling back to the shared default.
pub fn default_learner() -> String {
    std::env::var(LEARNER_ENV).unwrap_or_else(|_| DEFAULT_LEARNER.to_string())
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
