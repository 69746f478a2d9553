//! Fixed-period tick scheduler for Rosterwatch.
//!
//! Drives the poll scheduler's two timers (query trigger and roster
//! render) with overrun detection, so a slow render does not cause a burst
//! of back-to-back ticks afterwards.
//!
//! # Disabled mode
//!
//! When `period` is zero the scheduler is disabled and
//! [`TickScheduler::wait_for_tick`] pends forever. A timer configured off
//! then simply never fires inside a `tokio::select!`.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = query_timer.wait_for_tick() => { /* trigger a query */ }
//!         _ = render_timer.wait_for_tick() => { /* render the roster */ }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for the tick scheduler.
///
/// A tick that fires late skips the missed periods and the schedule
/// restarts from the moment it fired.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Zero disables the scheduler.
    pub period: Duration,
    /// Delay before the first tick. `None` means one full period.
    pub initial_delay: Option<Duration>,
    /// Random jitter (0..max) added to the first tick so timers created at
    /// the same instant do not fire in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            initial_delay: None,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// A config ticking every `period`, first tick after one period.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Fire the first tick right away instead of after one period.
    pub fn immediate(mut self) -> Self {
        self.initial_delay = Some(Duration::ZERO);
        self
    }

    /// Whether the scheduler will ever fire.
    pub fn is_enabled(&self) -> bool {
        !self.period.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by
/// [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired late.
    pub overrun: bool,
    /// How many whole periods were skipped (0 in normal operation).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick scheduler. One per timer.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire. `None` when disabled.
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Create a new scheduler from config.
    ///
    /// The first tick is due after `initial_delay` (default: one period)
    /// plus up to `initial_jitter`.
    pub fn new(config: TickConfig) -> Self {
        let next_tick = config.is_enabled().then(|| {
            let delay = config.initial_delay.unwrap_or(config.period);
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max.max(1)))
            };
            Instant::now() + delay + jitter
        });

        if config.is_enabled() {
            debug!(
                period_ms = config.period.as_millis() as u64,
                "tick scheduler created"
            );
        } else {
            debug!("tick scheduler created disabled (zero period)");
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
        }
    }

    /// Wait until the next tick is due.
    ///
    /// Pends forever when disabled. Cancel safe: dropping the future
    /// before it resolves leaves the schedule unchanged.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };
        let period = self.config.period;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        // More than 10% of a period late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos()) as u64
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_millis() as u64,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = Some(now + period);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Whether this scheduler never fires.
    pub fn is_disabled(&self) -> bool {
        self.next_tick.is_none()
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }
}
