//! Reconnect backoff policy.
//!
//! The wait before retry number `attempt` (0-indexed) is
//! `min(base_wait × 2^attempt, max_wait)`. It is derived from the attempt
//! number alone, so the policy is a pure function and never drifts.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use rosterwatch_session::BackoffPolicy;
//!
//! let policy = BackoffPolicy {
//!     base_wait_secs: 1.0,
//!     max_wait_secs: 3600.0,
//!     max_retries: 720,
//! };
//!
//! assert_eq!(policy.wait_for(0), Duration::from_secs(1));
//! assert_eq!(policy.wait_for(3), Duration::from_secs(8));
//! // 2^12 = 4096 s, capped at one hour.
//! assert_eq!(policy.wait_for(12), Duration::from_secs(3600));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential reconnect backoff with a cap and a retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Wait after the first failure, in seconds.
    pub base_wait_secs: f64,
    /// Upper bound on any single wait, in seconds.
    pub max_wait_secs: f64,
    /// Consecutive failures tolerated before giving up for good.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    /// 1 s doubling up to 4000 s, 150 retries: roughly a week of trying
    /// before the monitor gives up.
    fn default() -> Self {
        Self {
            base_wait_secs: 1.0,
            max_wait_secs: 4000.0,
            max_retries: 150,
        }
    }
}

impl BackoffPolicy {
    /// The cap as a `Duration`. Non-finite or negative values become zero.
    pub fn max_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_wait_secs).unwrap_or(Duration::ZERO)
    }

    /// Computes the wait before retry number `attempt`.
    ///
    /// Monotonically non-decreasing in `attempt` until it reaches the cap.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let max = self.max_wait();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.base_wait_secs * 2f64.powi(exp);

        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        // Anything a Duration cannot hold is past the cap too.
        Duration::try_from_secs_f64(secs).map_or(max, |wait| wait.min(max))
    }

    /// Whether `attempt` consecutive failures exhaust the retry budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }

    /// Sum of every wait the policy allows before giving up.
    ///
    /// Useful for logging how long an outage the monitor rides out.
    pub fn total_span(&self) -> Duration {
        (0..self.max_retries)
            .map(|a| self.wait_for(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: f64, max: f64, retries: u32) -> BackoffPolicy {
        BackoffPolicy {
            base_wait_secs: base,
            max_wait_secs: max,
            max_retries: retries,
        }
    }

    #[test]
    fn test_wait_for_doubles_until_cap() {
        let p = policy(1.0, 3600.0, 720);

        let waits: Vec<u64> = (0..14).map(|a| p.wait_for(a).as_secs()).collect();

        assert_eq!(
            waits,
            vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 3600, 3600]
        );
    }

    #[test]
    fn test_wait_for_is_monotonic() {
        let p = policy(0.25, 100.0, 50);

        for a in 0..200 {
            assert!(p.wait_for(a) <= p.wait_for(a + 1), "attempt {a}");
            assert!(p.wait_for(a) <= p.max_wait());
        }
    }

    #[test]
    fn test_wait_for_past_duration_range_stays_at_cap() {
        let p = BackoffPolicy::default();

        // 2^64 s no longer fits in a Duration.
        for a in 64..p.max_retries {
            assert_eq!(p.wait_for(a), Duration::from_secs(4000), "attempt {a}");
        }
    }

    #[test]
    fn test_total_span_default_policy() {
        let p = BackoffPolicy::default();
        // 1 + 2 + ... + 2048 = 4095 s, then 138 capped waits.
        let expected = Duration::from_secs(4095 + 138 * 4000);
        assert_eq!(p.total_span(), expected);
    }

    #[test]
    fn test_wait_for_huge_attempt_is_capped() {
        let p = policy(1.0, 4000.0, 150);
        assert_eq!(p.wait_for(u32::MAX), Duration::from_secs(4000));
    }

    #[test]
    fn test_wait_for_sub_second_base() {
        let p = policy(0.01, 0.05, 10);
        assert_eq!(p.wait_for(0), Duration::from_millis(10));
        assert_eq!(p.wait_for(1), Duration::from_millis(20));
        assert_eq!(p.wait_for(3), Duration::from_millis(50));
    }

    #[test]
    fn test_wait_for_negative_base_is_zero() {
        let p = policy(-1.0, 10.0, 3);
        assert_eq!(p.wait_for(2), Duration::ZERO);
    }

    #[test]
    fn test_is_exhausted_at_budget() {
        let p = policy(1.0, 10.0, 3);
        assert!(!p.is_exhausted(0));
        assert!(!p.is_exhausted(2));
        assert!(p.is_exhausted(3));
        assert!(p.is_exhausted(4));
    }

    #[test]
    fn test_total_span_sums_waits() {
        let p = policy(1.0, 4.0, 4);
        // 1 + 2 + 4 + 4
        assert_eq!(p.total_span(), Duration::from_secs(11));
    }

    #[test]
    fn test_default_matches_deployment() {
        let p = BackoffPolicy::default();
        assert_eq!(p.wait_for(0), Duration::from_secs(1));
        assert_eq!(p.max_wait(), Duration::from_secs(4000));
        assert_eq!(p.max_retries, 150);
    }
}
