//! Integration tests for the TCP transport.
//!
//! These tests bind a real listener on an OS-assigned port and talk to it
//! through [`TcpConnector`], so bytes really cross a socket.

#[cfg(feature = "tcp")]
mod tcp {
    use std::time::Duration;

    use rosterwatch_transport::{Connection, Connector, MAX_LINE_LEN, TcpConnector, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Binds to `127.0.0.1:0` and returns the listener with its port.
    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    async fn accept(listener: &TcpListener) -> TcpStream {
        let (stream, _) = listener.accept().await.expect("should accept");
        stream
    }

    #[tokio::test]
    async fn test_send_line_appends_crlf() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        conn.send_line(b"NICK monitor").await.expect("send");

        let mut buf = [0u8; 14];
        server.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"NICK monitor\r\n");
    }

    #[tokio::test]
    async fn test_recv_line_splits_on_newlines() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        // Two lines in one write, one with a bare LF.
        server
            .write_all(b":srv 001 monitor :Welcome\r\nPING :token\n")
            .await
            .expect("write");

        assert_eq!(
            conn.recv_line().await.unwrap(),
            Some(b":srv 001 monitor :Welcome".to_vec())
        );
        assert_eq!(conn.recv_line().await.unwrap(), Some(b"PING :token".to_vec()));
    }

    #[tokio::test]
    async fn test_recv_line_reassembles_split_writes() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        server.write_all(b":srv 315 monitor #ch").await.unwrap();
        server.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        server.write_all(b"an :End of /WHO list.\r\n").await.unwrap();

        assert_eq!(
            conn.recv_line().await.unwrap(),
            Some(b":srv 315 monitor #chan :End of /WHO list.".to_vec())
        );
    }

    #[tokio::test]
    async fn test_recv_line_survives_cancellation_mid_line() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        server.write_all(b"PING :to").await.unwrap();
        server.flush().await.unwrap();

        // The first half arrives, then the read is cancelled by the timeout.
        let first = tokio::time::timeout(Duration::from_millis(50), conn.recv_line()).await;
        assert!(first.is_err(), "no complete line yet");

        server.write_all(b"ken\r\n").await.unwrap();
        assert_eq!(conn.recv_line().await.unwrap(), Some(b"PING :token".to_vec()));
    }

    #[tokio::test]
    async fn test_recv_line_unterminated_overlong_line_is_rejected() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        server.write_all(&vec![b'a'; MAX_LINE_LEN + 100]).await.unwrap();

        let err = conn.recv_line().await.err().expect("should fail");
        assert!(matches!(err, TransportError::LineTooLong { max } if max == MAX_LINE_LEN));
    }

    #[tokio::test]
    async fn test_recv_line_terminated_overlong_line_is_rejected() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");
        let mut server = server;

        let mut line = vec![b'a'; MAX_LINE_LEN + 1];
        line.extend_from_slice(b"\r\n");
        server.write_all(&line).await.unwrap();

        let err = conn.recv_line().await.err().expect("should fail");
        assert!(matches!(err, TransportError::LineTooLong { .. }));
    }

    #[tokio::test]
    async fn test_recv_line_returns_none_on_clean_close() {
        let (listener, port) = listen().await;
        let connector = TcpConnector::default();

        let (conn, server) =
            tokio::join!(connector.connect("127.0.0.1", port), accept(&listener));
        let conn = conn.expect("should connect");

        drop(server);

        assert_eq!(conn.recv_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connect_refused_is_transient() {
        // Grab a free port, then close the listener so nothing is there.
        let (listener, port) = listen().await;
        drop(listener);

        let err = TcpConnector::default()
            .connect("127.0.0.1", port)
            .await
            .err()
            .expect("should fail");

        assert!(matches!(err, TransportError::ConnectFailed { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_connect_empty_host_is_fatal() {
        let err = TcpConnector::default()
            .connect("", 6667)
            .await
            .err()
            .expect("should fail");

        assert!(err.is_fatal());
    }
}
