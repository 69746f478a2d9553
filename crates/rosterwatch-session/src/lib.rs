//! Connection supervision core for Rosterwatch.
//!
//! This crate holds everything about the presence monitor's session that
//! can be decided without touching a socket:
//!
//! 1. **State machine**: registration, nickname conflicts, channel join,
//!    and roster queries ([`SessionMachine`])
//! 2. **Reconnect policy**: how long to wait after the n-th consecutive
//!    failure and when to give up ([`BackoffPolicy`])
//! 3. **Roster handoff**: the latest completed roster and the phase flags,
//!    readable from any thread ([`SharedStatus`], [`RosterCache`])
//!
//! The machine consumes parsed [`Message`](rosterwatch_protocol::Message)s
//! and returns [`Action`]s; the caller owns the connection and performs
//! them. That keeps every transition unit-testable.
//!
//! # How it fits in the stack
//!
//! ```text
//! Monitor run loop (above)  ← drives connections, sleeps between retries
//!     ↕
//! Session Layer (this crate)  ← decides what each line means
//!     ↕
//! Protocol Layer (below)  ← provides Message, WhoReply, numerics
//! ```

mod backoff;
mod error;
mod machine;
mod roster;
mod shared;
mod state;

pub use backoff::BackoffPolicy;
pub use error::SessionError;
pub use machine::{Action, Retry, SessionMachine};
pub use roster::{Presence, RosterCache, RosterEntry, RosterSnapshot};
pub use shared::SharedStatus;
pub use state::{ConnectionState, Phase, SessionConfig};
