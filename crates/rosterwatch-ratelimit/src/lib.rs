//! Mixed sliding-window rate limiting for Rosterwatch.
//!
//! A [`MixedRateLimiter`] admits an event only if *every* configured window
//! allows it: any number of global windows (one counter for everybody) and
//! any number of per-key windows (one counter per user). Acceptance is
//! recorded in all windows at once with the same timestamp; a rejection
//! changes nothing.
//!
//! ```text
//! try_accept(key)
//!   ├─ check every global window   ─┐
//!   ├─ check every per-key window  ─┤ all pass? ──no──→ false (no mutation)
//!   │                               │
//!   └─ commit `now` to every window ◄┘ yes ──→ true
//! ```
//!
//! # Example
//! ```rust
//! use std::time::{Duration, Instant};
//! use rosterwatch_ratelimit::{MixedRateLimiter, WindowSpec};
//!
//! let mut limiter = MixedRateLimiter::new()
//!     .with_per_key(WindowSpec::new(3, 60.0))
//!     .unwrap();
//!
//! let t0 = Instant::now();
//! assert!(limiter.try_accept_at(t0, &"u1"));
//! assert!(limiter.try_accept_at(t0, &"u1"));
//! assert!(limiter.try_accept_at(t0, &"u1"));
//! assert!(!limiter.try_accept_at(t0, &"u1"));
//! assert!(limiter.try_accept_at(t0 + Duration::from_secs(61), &"u1"));
//! ```
//!
//! Use [`SharedRateLimiter`] when handlers may run concurrently: it holds
//! one lock across check and commit.

mod error;
mod limiter;
mod registry;
mod shared;
mod window;

pub use error::RateLimitError;
pub use limiter::{DEFAULT_MAX_TRACKED_KEYS, MixedRateLimiter};
pub use registry::{LimiterConfig, LimiterRegistry};
pub use shared::SharedRateLimiter;
pub use window::{SlidingWindow, WindowSpec};
