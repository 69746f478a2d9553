//! # Rosterwatch
//!
//! Keeps a live roster of who is playing, read from an IRC channel, and
//! throttles expensive bot actions with sliding-window rate limits.
//!
//! Two execution contexts cooperate:
//!
//! ```text
//!   host runtime (tokio)                     presence-monitor thread
//!  ┌──────────────────────┐   Query cmd    ┌──────────────────────────┐
//!  │ PollScheduler        │ ─────────────→ │ supervisor run loop      │
//!  │  query timer (10 s)  │                │  SessionMachine          │
//!  │  render timer (20 s) │ ←───────────── │  connect / backoff / WHO │
//!  └──────────────────────┘ SharedStatus   └──────────────────────────┘
//!           │               (atomics + Arc snapshot)
//!           ▼
//!     RosterRenderer
//! ```
//!
//! The network thread never waits on the host runtime, and the host only
//! reads atomics and cloned `Arc` snapshots, so neither side can stall the
//! other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rosterwatch::prelude::*;
//! use rosterwatch_transport::TcpConnector;
//!
//! # async fn run() -> Result<(), RosterwatchError> {
//! let config = AppConfig::load_from_env()?.validated()?;
//! let monitor = PresenceMonitor::start(config.monitor.clone(), TcpConnector::default())?;
//!
//! let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//! let poll = PollScheduler::new(monitor.handle(), LogRenderer, config.poll.clone());
//! let task = tokio::spawn(poll.run(std::future::ready(()), stop_rx));
//!
//! // ... later
//! stop_tx.send_replace(true);
//! let _ = task.await;
//! monitor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

pub mod config;
mod error;
pub mod monitor;
pub mod poll;
pub mod render;
mod supervisor;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use error::RosterwatchError;
pub use monitor::{MonitorHandle, PresenceMonitor};
pub use poll::{PollConfig, PollScheduler};
pub use render::{JsonLinesRenderer, LogRenderer, RenderError, RosterRenderer, RosterReport};

pub use rosterwatch_ratelimit as ratelimit;
pub use rosterwatch_session::{Phase, Presence, RosterEntry, RosterSnapshot, SessionConfig};

/// The types most hosts need.
pub mod prelude {
    pub use crate::{
        AppConfig, JsonLinesRenderer, LogRenderer, MonitorHandle, Phase, PollConfig,
        PollScheduler, PresenceMonitor, RosterRenderer, RosterReport, RosterSnapshot,
        RosterwatchError, SessionConfig,
    };
    pub use rosterwatch_ratelimit::{LimiterRegistry, SharedRateLimiter};
}
