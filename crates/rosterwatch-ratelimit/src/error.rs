//! Error types for rate limiter configuration.
//!
//! Rejecting an event is not an error: `try_accept` returns `false`.

/// Errors raised while building limiters.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// A window would admit nothing or never forget anything.
    #[error("invalid window {rate}/{per_secs}s: {reason}")]
    InvalidWindow {
        rate: usize,
        per_secs: f64,
        reason: &'static str,
    },

    /// `max_tracked_keys` of zero would evict every key immediately.
    #[error("max_tracked_keys must be at least 1")]
    ZeroKeyBound,

    /// A limiter name has no configuration.
    #[error("unknown limiter: {0}")]
    UnknownLimiter(String),
}
