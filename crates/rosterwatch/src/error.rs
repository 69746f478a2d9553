//! Unified error type for Rosterwatch.

use rosterwatch_protocol::ProtocolError;
use rosterwatch_ratelimit::RateLimitError;
use rosterwatch_session::SessionError;
use rosterwatch_transport::TransportError;

use crate::{ConfigError, RenderError};

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
///
/// None of these cross from the network thread to the host: that thread
/// logs its errors and turns them into phase changes.
#[derive(Debug, thiserror::Error)]
pub enum RosterwatchError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad config, not ready, terminal).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rate limiter could not be built.
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// The renderer failed to publish a report.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The network thread or its runtime could not be started.
    #[error("failed to start the presence monitor: {0}")]
    Spawn(#[source] std::io::Error),

    /// The network thread panicked.
    #[error("presence monitor thread panicked")]
    MonitorPanicked,

    /// Waiting for a process signal failed.
    #[error("signal handling failed: {0}")]
    Signal(#[source] std::io::Error),
}
