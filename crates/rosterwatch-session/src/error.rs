//! Error types for the session layer.

use crate::Phase;

/// Errors that can occur while driving the session state machine.
///
/// None of these are failures of the connection itself; those are
/// transport errors and are handled by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A roster query was requested before the channel join completed.
    #[error("not ready for a roster query (phase: {0})")]
    NotReady(Phase),

    /// A roster query is already outstanding and not yet stale.
    #[error("a roster query is already in flight")]
    QueryInFlight,

    /// The machine has failed or been stopped and will not run again.
    #[error("session is terminal (phase: {0})")]
    Terminal(Phase),

    /// The configuration cannot work, e.g. an empty nickname.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}
