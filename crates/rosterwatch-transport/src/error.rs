/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote address could not be parsed or resolved.
    ///
    /// Retrying will not fix a bad address, so the supervisor treats
    /// this as fatal.
    #[error("invalid address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Establishing the connection failed (refused, unreachable, reset).
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An inbound line exceeded the configured maximum length.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

impl TransportError {
    /// Returns `true` for errors that no amount of reconnecting can fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidAddress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fatal_invalid_address_is_fatal() {
        let err = TransportError::InvalidAddress {
            addr: "nowhere:abc".into(),
            reason: "bad port".into(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_is_fatal_transient_errors_are_not_fatal() {
        let refused = TransportError::ConnectFailed {
            addr: "127.0.0.1:6667".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(!refused.is_fatal());
        assert!(!TransportError::ConnectionClosed("eof".into()).is_fatal());
        assert!(!TransportError::LineTooLong { max: 512 }.is_fatal());
    }
}
