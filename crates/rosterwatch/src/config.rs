//! Application configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!   "monitor": { "host": "irc.gamesurge.net", "channel": "#cncnet" },
//!   "poll": { "query_interval_secs": 10, "render_interval_secs": 20 },
//!   "rate_limits": {
//!     "chat": { "global": [{ "rate": 10, "per_secs": 60 }],
//!               "per_key": [{ "rate": 3, "per_secs": 60 }] }
//!   }
//! }
//! ```
//!
//! Every section is optional. A missing file means all defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rosterwatch_ratelimit::LimiterConfig;
use rosterwatch_session::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::PollConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "ROSTERWATCH_CONFIG";
/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "rosterwatch.json";
/// Environment variable that overrides the channel key.
///
/// Keeps the secret out of the config file.
pub const CHANNEL_KEY_ENV: &str = "ROSTERWATCH_CHANNEL_KEY";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`AppConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The values parse but cannot work together.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the binary needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: SessionConfig,
    pub poll: PollConfig,
    /// Named rate limiters. Defaults to the `chat` and `autoreact` presets.
    pub rate_limits: BTreeMap<String, LimiterConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: SessionConfig::default(),
            poll: PollConfig::default(),
            rate_limits: LimiterConfig::presets(),
        }
    }
}

impl AppConfig {
    /// Reads `path`. A file that does not exist yields the defaults.
    ///
    /// # Errors
    /// [`ConfigError::Read`] for I/O failures other than not-found and
    /// [`ConfigError::Parse`] for malformed JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parses a config document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Loads from `$ROSTERWATCH_CONFIG` (or `rosterwatch.json`) and applies
    /// `$ROSTERWATCH_CHANNEL_KEY` if set.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let config = Self::load(&path)?;
        Ok(config.with_channel_key(std::env::var(CHANNEL_KEY_ENV).ok()))
    }

    /// Replaces the channel key when `key` is non-empty.
    pub fn with_channel_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.monitor.channel_key = Some(key);
        }
        self
    }

    /// Checks that the monitor, the poll timers and every limiter can run.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first problem.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.monitor
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.poll.validate()?;
        for (name, limiter) in &self.rate_limits {
            limiter
                .build::<String>()
                .map_err(|e| ConfigError::Invalid(format!("rate limit {name:?}: {e}")))?;
        }
        Ok(self)
    }
}
