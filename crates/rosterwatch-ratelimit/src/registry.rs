//! Named limiters built from configuration.
//!
//! ```json
//! {
//!   "chat":      { "per_key": [{ "rate": 3, "per_secs": 60 }],
//!                  "global":  [{ "rate": 10, "per_secs": 60 }] },
//!   "autoreact": { "per_key": [{ "rate": 3, "per_secs": 60 }] }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    DEFAULT_MAX_TRACKED_KEYS, MixedRateLimiter, RateLimitError, SharedRateLimiter,
    WindowSpec,
};

/// Window definitions for one named limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub global: Vec<WindowSpec>,
    #[serde(default)]
    pub per_key: Vec<WindowSpec>,
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

fn default_max_tracked_keys() -> usize {
    DEFAULT_MAX_TRACKED_KEYS
}

impl LimiterConfig {
    /// Throttle for expensive AI chat replies: 3 per minute per user and
    /// 10 per minute overall.
    pub fn chat() -> Self {
        Self {
            global: vec![WindowSpec::new(10, 60.0)],
            per_key: vec![WindowSpec::new(3, 60.0)],
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }

    /// Throttle for automatic reactions: 3 per minute per user.
    pub fn autoreact() -> Self {
        Self {
            global: Vec::new(),
            per_key: vec![WindowSpec::new(3, 60.0)],
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }

    /// The named presets, keyed `chat` and `autoreact`.
    pub fn presets() -> BTreeMap<String, LimiterConfig> {
        BTreeMap::from([
            ("chat".to_string(), Self::chat()),
            ("autoreact".to_string(), Self::autoreact()),
        ])
    }

    /// Builds the limiter these windows describe.
    ///
    /// # Errors
    /// Returns the first invalid window, or
    /// [`RateLimitError::ZeroKeyBound`].
    pub fn build<K: Hash + Eq + Clone>(&self) -> Result<MixedRateLimiter<K>, RateLimitError> {
        let mut limiter =
            MixedRateLimiter::new().with_max_tracked_keys(self.max_tracked_keys)?;
        for spec in &self.global {
            limiter = limiter.with_global(*spec)?;
        }
        for spec in &self.per_key {
            limiter = limiter.with_per_key(*spec)?;
        }
        Ok(limiter)
    }
}

/// Limiters by name, each shareable across handlers.
#[derive(Debug)]
pub struct LimiterRegistry<K> {
    limiters: HashMap<String, SharedRateLimiter<K>>,
}

impl<K: Hash + Eq + Clone> LimiterRegistry<K> {
    /// Builds one limiter per configured name.
    ///
    /// # Errors
    /// Fails on the first invalid configuration.
    pub fn from_config(configs: &BTreeMap<String, LimiterConfig>) -> Result<Self, RateLimitError> {
        let mut limiters = HashMap::with_capacity(configs.len());
        for (name, config) in configs {
            let limiter = config.build()?;
            info!(
                limiter = %name,
                global = config.global.len(),
                per_key = config.per_key.len(),
                "rate limiter configured"
            );
            limiters.insert(name.clone(), SharedRateLimiter::new(limiter));
        }
        Ok(Self { limiters })
    }

    /// A handle to the named limiter.
    pub fn get(&self, name: &str) -> Option<SharedRateLimiter<K>> {
        self.limiters.get(name).cloned()
    }

    /// Like [`get`](Self::get), for names the caller cannot run without.
    ///
    /// # Errors
    /// Returns [`RateLimitError::UnknownLimiter`].
    pub fn require(&self, name: &str) -> Result<SharedRateLimiter<K>, RateLimitError> {
        self.get(name)
            .ok_or_else(|| RateLimitError::UnknownLimiter(name.to_string()))
    }

    /// Configured names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.limiters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
