//! The mixed limiter: global windows plus lazily created per-key windows.
//!
//! # Concurrency note
//!
//! `MixedRateLimiter` is not thread-safe by itself. `try_accept` takes
//! `&mut self`, so check and commit cannot interleave with another caller
//! on the same instance. Share one between tasks through
//! [`SharedRateLimiter`](crate::SharedRateLimiter).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use tracing::debug;

use crate::{RateLimitError, SlidingWindow, WindowSpec};

/// Per-key state is bounded to this many keys unless configured otherwise.
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Windows for one key.
#[derive(Debug, Clone)]
struct KeyState {
    windows: Vec<SlidingWindow>,
    last_accept: Instant,
}

impl KeyState {
    fn is_idle(&self, now: Instant) -> bool {
        self.windows.iter().all(|w| w.is_idle(now))
    }
}

/// Admits an event only if every global and every per-key window allows it.
///
/// ## Per-key eviction
///
/// At most `max_tracked_keys` keys keep state. When a new key pushes the
/// count over the bound, keys whose windows have all aged out are dropped
/// first (losing nothing). If that is not enough, the least recently
/// accepted keys go; such a key starts over with empty windows. Global
/// windows are never evicted.
#[derive(Debug, Clone)]
pub struct MixedRateLimiter<K> {
    global: Vec<SlidingWindow>,
    per_key: Vec<WindowSpec>,
    keys: HashMap<K, KeyState>,
    max_tracked_keys: usize,
}

impl<K> Default for MixedRateLimiter<K> {
    fn default() -> Self {
        Self {
            global: Vec::new(),
            per_key: Vec::new(),
            keys: HashMap::new(),
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }
}

impl<K: Hash + Eq + Clone> MixedRateLimiter<K> {
    /// A limiter with no windows; it admits everything until windows are
    /// added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a window shared by all keys.
    ///
    /// # Errors
    /// Returns [`RateLimitError::InvalidWindow`] for an unusable spec.
    pub fn with_global(mut self, spec: WindowSpec) -> Result<Self, RateLimitError> {
        self.global.push(SlidingWindow::new(spec)?);
        Ok(self)
    }

    /// Adds a window kept separately for every key.
    ///
    /// Must be called before the first event; keys already tracked do not
    /// gain the new window.
    ///
    /// # Errors
    /// Returns [`RateLimitError::InvalidWindow`] for an unusable spec.
    pub fn with_per_key(mut self, spec: WindowSpec) -> Result<Self, RateLimitError> {
        spec.per()?;
        self.per_key.push(spec);
        Ok(self)
    }

    /// Sets the per-key state bound.
    ///
    /// # Errors
    /// Returns [`RateLimitError::ZeroKeyBound`] for zero.
    pub fn with_max_tracked_keys(mut self, max: usize) -> Result<Self, RateLimitError> {
        if max == 0 {
            return Err(RateLimitError::ZeroKeyBound);
        }
        self.max_tracked_keys = max;
        Ok(self)
    }

    /// [`try_accept_at`](Self::try_accept_at) with the current time.
    pub fn try_accept(&mut self, key: &K) -> bool {
        self.try_accept_at(Instant::now(), key)
    }

    /// Admits and records the event if every window allows it.
    ///
    /// All windows are checked and committed with the same `now`. A
    /// rejection leaves every window untouched.
    pub fn try_accept_at(&mut self, now: Instant, key: &K) -> bool {
        if !self.is_allowed_at(now, key) {
            return false;
        }

        for window in &mut self.global {
            window.commit(now);
        }

        if self.per_key.is_empty() {
            return true;
        }

        if let Some(state) = self.keys.get_mut(key) {
            for window in &mut state.windows {
                window.commit(now);
            }
            state.last_accept = now;
            return true;
        }

        let mut windows = self.fresh_windows();
        for window in &mut windows {
            window.commit(now);
        }
        self.keys.insert(
            key.clone(),
            KeyState {
                windows,
                last_accept: now,
            },
        );
        if self.keys.len() > self.max_tracked_keys {
            self.evict(now, key);
        }
        true
    }

    /// [`is_allowed_at`](Self::is_allowed_at) with the current time.
    pub fn is_allowed(&self, key: &K) -> bool {
        self.is_allowed_at(Instant::now(), key)
    }

    /// Whether an event at `now` would be admitted. Does not mutate, and
    /// does not create state for an unseen key.
    pub fn is_allowed_at(&self, now: Instant, key: &K) -> bool {
        if !self.global.iter().all(|w| w.check(now)) {
            return false;
        }
        match self.keys.get(key) {
            Some(state) => state.windows.iter().all(|w| w.check(now)),
            // Fresh windows admit at least one event.
            None => true,
        }
    }

    /// Drops every key whose windows have all aged out.
    ///
    /// Returns how many keys were removed.
    pub fn purge_idle(&mut self, now: Instant) -> usize {
        let before = self.keys.len();
        self.keys.retain(|_, state| !state.is_idle(now));
        before - self.keys.len()
    }

    /// Forgets one key's history.
    pub fn forget(&mut self, key: &K) -> bool {
        self.keys.remove(key).is_some()
    }

    /// Number of keys currently holding state.
    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn max_tracked_keys(&self) -> usize {
        self.max_tracked_keys
    }

    /// Number of global and per-key windows configured.
    pub fn window_counts(&self) -> (usize, usize) {
        (self.global.len(), self.per_key.len())
    }

    fn fresh_windows(&self) -> Vec<SlidingWindow> {
        self.per_key
            .iter()
            // Specs were validated when added.
            .filter_map(|spec| SlidingWindow::new(*spec).ok())
            .collect()
    }

    /// Brings the key count back under the bound, never evicting `keep`.
    fn evict(&mut self, now: Instant, keep: &K) {
        let idle = self.purge_idle(now);

        let mut lru = 0;
        while self.keys.len() > self.max_tracked_keys {
            let oldest = self
                .keys
                .iter()
                .filter(|(k, _)| *k != keep)
                .min_by_key(|(_, state)| state.last_accept)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.keys.remove(&k);
                    lru += 1;
                }
                None => break,
            }
        }

        debug!(idle, lru, tracked = self.keys.len(), "evicted rate limiter keys");
    }
}
