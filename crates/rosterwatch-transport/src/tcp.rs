//! Plain TCP transport implementation using `tokio::net::TcpStream`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Connector, MAX_LINE_LEN, TransportError, strip_terminator};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A [`Connector`] that dials plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Creates a connector that gives up on a dial after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Connection, TransportError> {
        let addr = format!("{host}:{port}");
        if host.trim().is_empty() || port == 0 {
            return Err(TransportError::InvalidAddress {
                addr,
                reason: "host must be non-empty and port non-zero".into(),
            });
        }

        let dial = TcpStream::connect((host, port));
        let stream = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectFailed { addr, source });
            }
            Err(_) => {
                return Err(TransportError::ConnectFailed {
                    addr,
                    source: std::io::Error::from(std::io::ErrorKind::TimedOut),
                });
            }
        };
        // Lines are small and latency matters more than batching.
        let _ = stream.set_nodelay(true);

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "tcp connection established");

        let (read, write) = stream.into_split();
        Ok(TcpConnection {
            id,
            reader: Mutex::new(LineReader {
                inner: BufReader::new(read),
                partial: Vec::new(),
            }),
            writer: Mutex::new(write),
        })
    }
}

/// Read half plus the bytes of a line that has not been terminated yet.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    partial: Vec<u8>,
}

/// A single TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl Connection for TcpConnection {
    async fn send_line(&self, line: &[u8]) -> Result<(), TransportError> {
        let mut framed = Vec::with_capacity(line.len() + 2);
        framed.extend_from_slice(line);
        framed.extend_from_slice(b"\r\n");

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&framed)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv_line(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut guard = self.reader.lock().await;
        let LineReader { inner, partial } = &mut *guard;

        loop {
            // `fill_buf` consumes nothing, and everything below it up to the
            // next await runs synchronously, so cancellation never loses bytes.
            let available = inner
                .fill_buf()
                .await
                .map_err(TransportError::ReceiveFailed)?;

            if available.is_empty() {
                if partial.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(strip_terminator(std::mem::take(partial))));
            }

            if let Some(pos) = available.iter().position(|b| *b == b'\n') {
                partial.extend_from_slice(&available[..=pos]);
                inner.consume(pos + 1);
                let line = strip_terminator(std::mem::take(partial));
                if line.len() > MAX_LINE_LEN {
                    return Err(TransportError::LineTooLong { max: MAX_LINE_LEN });
                }
                return Ok(Some(line));
            }

            let n = available.len();
            partial.extend_from_slice(available);
            inner.consume(n);

            if partial.len() > MAX_LINE_LEN {
                partial.clear();
                return Err(TransportError::LineTooLong { max: MAX_LINE_LEN });
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
