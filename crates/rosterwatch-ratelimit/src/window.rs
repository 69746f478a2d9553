//! A single sliding window: at most `rate` events in any trailing `per`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::RateLimitError;

/// Definition of one window, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Events admitted per window.
    pub rate: usize,
    /// Window length in seconds.
    pub per_secs: f64,
}

impl WindowSpec {
    pub fn new(rate: usize, per_secs: f64) -> Self {
        Self { rate, per_secs }
    }

    /// The window length as a `Duration`.
    ///
    /// # Errors
    /// Returns [`RateLimitError::InvalidWindow`] for a zero rate or a
    /// non-positive or non-finite length.
    pub fn per(&self) -> Result<Duration, RateLimitError> {
        let invalid = |reason| RateLimitError::InvalidWindow {
            rate: self.rate,
            per_secs: self.per_secs,
            reason,
        };

        if self.rate == 0 {
            return Err(invalid("rate must be at least 1"));
        }
        if !(self.per_secs.is_finite() && self.per_secs > 0.0) {
            return Err(invalid("per must be a positive number of seconds"));
        }
        Duration::try_from_secs_f64(self.per_secs)
            .map_err(|_| invalid("per is out of range"))
    }
}

/// Timestamps of accepted events, oldest first, never more than `rate`.
///
/// The window is half-open, `(now - per, now]`: a timestamp exactly `per`
/// old no longer counts.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    rate: usize,
    per: Duration,
    stamps: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Builds an empty window from a validated spec.
    pub fn new(spec: WindowSpec) -> Result<Self, RateLimitError> {
        let per = spec.per()?;
        Ok(Self {
            rate: spec.rate,
            per,
            stamps: VecDeque::with_capacity(spec.rate),
        })
    }

    /// Whether one more event at `now` fits. Does not mutate.
    pub fn check(&self, now: Instant) -> bool {
        if self.stamps.len() < self.rate {
            return true;
        }
        match self.stamps.front() {
            Some(&oldest) => now.saturating_duration_since(oldest) >= self.per,
            None => true,
        }
    }

    /// Records an accepted event, evicting the oldest stamp at capacity.
    ///
    /// A `now` earlier than the newest stamp is clamped to it so the
    /// stamps stay ordered.
    pub fn commit(&mut self, now: Instant) {
        let now = self.stamps.back().map_or(now, |&newest| newest.max(now));
        if self.stamps.len() >= self.rate {
            self.stamps.pop_front();
        }
        self.stamps.push_back(now);
    }

    /// Whether every stamp has aged out, so dropping the window loses
    /// nothing.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.stamps
            .back()
            .is_none_or(|&newest| now.saturating_duration_since(newest) >= self.per)
    }

    /// Stored stamps, including any that have aged out but not been
    /// evicted yet.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn rate(&self) -> usize {
        self.rate
    }

    pub fn per(&self) -> Duration {
        self.per
    }
}
