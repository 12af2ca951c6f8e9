//! Runtime configuration for the habit tracker.
//!
//! # Responsibility
//! - Describe where the database and logs live and which chat receives
//!   reminders for owners without their own chat.
//! - Load settings from a JSON file and merge caller-supplied overrides.
//!
//! # Invariants
//! - Every field has a usable default; an empty file is a valid config.
//! - Overrides win over file values; blank overrides are ignored.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Tracker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// SQLite file; in-memory storage when unset.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute directory for rolling log files; file logging is off when unset.
    pub log_dir: Option<PathBuf>,
    /// Reminder target for owners who have not linked a chat.
    pub default_chat_id: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_chat_id: None,
        }
    }
}

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Values that take precedence over the config file, typically parsed from
/// command-line flags or their environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub default_chat_id: Option<String>,
}

impl TrackerConfig {
    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Reads `path` when given, otherwise returns defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json_str(&source)
            }
            None => Ok(Self::default()),
        }
    }

    /// Applies `overrides` on top of the loaded values.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(db_path) = overrides.db_path.filter(|path| !path.as_os_str().is_empty()) {
            self.db_path = Some(db_path);
        }
        if let Some(log_level) = non_blank(overrides.log_level) {
            self.log_level = log_level;
        }
        if let Some(log_dir) = overrides.log_dir.filter(|path| !path.as_os_str().is_empty()) {
            self.log_dir = Some(log_dir);
        }
        if let Some(chat_id) = non_blank(overrides.default_chat_id) {
            self.default_chat_id = Some(chat_id);
        }
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
