//! Transport abstraction layer for Rosterwatch.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the presence monitor reaches its chat server. The monitor only ever
//! needs an outbound, line-delimited byte stream: it dials, writes whole
//! lines, and reads whole lines back.
//!
//! # Feature Flags
//!
//! - `tcp` (default): plain TCP via `tokio::net::TcpStream`
//! - `memory`: an in-process connector/listener pair for tests

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryConnection, MemoryConnector, MemoryListener, MemoryPeer};
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpConnector};

use std::fmt;

/// Longest inbound line accepted, terminator included.
///
/// IRC caps lines at 512 bytes, but many networks send longer ones with
/// message tags, so there is some headroom.
pub const MAX_LINE_LEN: usize = 8192;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Dials new outbound connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a connection to `host:port`.
    async fn connect(&self, host: &str, port: u16) -> Result<Self::Connection, TransportError>;
}

/// A single connection that exchanges newline-terminated lines.
pub trait Connection: Send + Sync + 'static {
    /// Sends one line. The implementation appends `\r\n`.
    async fn send_line(&self, line: &[u8]) -> Result<(), TransportError>;

    /// Receives the next line with its terminator stripped.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    ///
    /// Must be cancel safe: if the future is dropped before it resolves,
    /// bytes already read stay buffered for the next call.
    async fn recv_line(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

/// Removes a trailing `\n` and an optional `\r` before it.
pub(crate) fn strip_terminator(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}
