//! In-process transport: a connector paired with a listener, joined by
//! unbounded channels.
//!
//! The monitor runs its network loop on its own thread and runtime; tests
//! drive the server side of the conversation from the test runtime through
//! a [`MemoryPeer`]. Tokio channels wake across runtimes, so no extra
//! plumbing is needed.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Connector, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct DialStats {
    dials: AtomicU32,
    refusals: AtomicU32,
}

/// Client side of an in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    stats: Arc<DialStats>,
}

impl MemoryConnector {
    /// Creates a connected connector/listener pair.
    pub fn pair() -> (MemoryConnector, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DialStats::default());
        (
            MemoryConnector {
                accept_tx,
                stats: Arc::clone(&stats),
            },
            MemoryListener { accept_rx, stats },
        )
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Connection, TransportError> {
        let addr = format!("{host}:{port}");
        self.stats.dials.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .stats
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::ConnectFailed {
                addr,
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));

        let peer = MemoryPeer {
            id,
            host: host.to_string(),
            port,
            to_client,
            from_client,
        };
        self.accept_tx.send(peer).map_err(|_| {
            TransportError::ConnectFailed {
                addr,
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }
        })?;

        Ok(MemoryConnection {
            id,
            inbound: Mutex::new(inbound),
            outbound: StdMutex::new(Some(outbound)),
        })
    }
}

/// Server side of an in-memory transport. Yields one [`MemoryPeer`] per
/// successful dial.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    stats: Arc<DialStats>,
}

impl MemoryListener {
    /// Waits for the next accepted connection.
    ///
    /// Returns `None` once every connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Makes the next `n` dials fail with "connection refused".
    pub fn refuse_next(&self, n: u32) {
        self.stats.refusals.store(n, Ordering::SeqCst);
    }

    /// Total dials attempted so far, refused ones included.
    pub fn dial_count(&self) -> u32 {
        self.stats.dials.load(Ordering::SeqCst)
    }
}

/// The server's view of one in-memory connection.
///
/// Dropping the peer closes the connection from the server side.
#[derive(Debug)]
pub struct MemoryPeer {
    id: ConnectionId,
    host: String,
    port: u16,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// Id shared with the client's [`MemoryConnection`].
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The `host:port` the client dialed.
    pub fn dialed(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delivers one line (without terminator) to the client.
    ///
    /// Returns `false` if the client side has already gone away.
    pub fn send_line(&self, line: &str) -> bool {
        self.send_raw(line.as_bytes())
    }

    /// Delivers arbitrary bytes as one line, e.g. invalid UTF-8.
    pub fn send_raw(&self, bytes: &[u8]) -> bool {
        self.to_client.send(bytes.to_vec()).is_ok()
    }

    /// Waits for the next line the client sent.
    ///
    /// Returns `None` once the client has closed or dropped its connection.
    pub async fn recv_line(&mut self) -> Option<String> {
        self.from_client
            .recv()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The client's view of one in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Connection for MemoryConnection {
    async fn send_line(&self, line: &[u8]) -> Result<(), TransportError> {
        let guard = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::SendFailed(std::io::Error::from(
                std::io::ErrorKind::NotConnected,
            )));
        };
        tx.send(line.to_vec()).map_err(|_| {
            TransportError::SendFailed(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        })
    }

    async fn recv_line(&self) -> Result<Option<Vec<u8>>, TransportError> {
        // `UnboundedReceiver::recv` is cancel safe.
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
