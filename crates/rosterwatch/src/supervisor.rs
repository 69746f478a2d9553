//! The network thread's run loop.
//!
//! ```text
//! loop:
//!   begin_connect ──→ connect ──ok──→ run_session ──→ Lost ─┐
//!                        │                 │                │
//!                        └──err──┐         └──→ Shutdown ─→ exit
//!                                ▼                          │
//!               connection_lost + next_retry ←──────────────┘
//!                   │                  │
//!               sleep(wait)         GiveUp ─→ exit
//! ```
//!
//! Every wait is raced against the shutdown signal, so `stop()` is
//! observed within one loop turn. Writes cannot be raced without giving up
//! a half-sent line, so each one is bounded by a timeout instead.

use std::io;
use std::time::{Duration, Instant};

use rosterwatch_protocol::{Codec, LineCodec, Message, ProtocolError};
use rosterwatch_session::{Action, Retry, SessionError, SessionMachine};
use rosterwatch_transport::{Connection, Connector, TransportError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::RosterwatchError;
use crate::monitor::MonitorCommand;

/// Longest a single outbound line may take to write.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for the QUIT sent on shutdown.
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The connection is gone; back off and reconnect.
    Lost,
    /// `stop()` was called; the machine is already stopped.
    Shutdown,
}

pub(crate) struct Supervisor<C: Connector> {
    machine: SessionMachine,
    connector: C,
    codec: LineCodec,
    commands: mpsc::UnboundedReceiver<MonitorCommand>,
    shutdown: watch::Receiver<bool>,
}

impl<C: Connector> Supervisor<C> {
    pub(crate) fn new(
        machine: SessionMachine,
        connector: C,
        commands: mpsc::UnboundedReceiver<MonitorCommand>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            machine,
            connector,
            codec: LineCodec,
            commands,
            shutdown,
        }
    }

    /// Connects, reconnects with backoff, and exits on stop or give-up.
    pub(crate) async fn run(mut self) {
        let host = self.machine.config().host.clone();
        let port = self.machine.config().port;
        info!(
            %host,
            port,
            channel = %self.machine.config().channel,
            nickname = %self.machine.config().nickname,
            "presence monitor starting"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let registration = match self.machine.begin_connect() {
                Ok(lines) => lines,
                Err(e) => {
                    debug!(error = %e, "not connecting");
                    break;
                }
            };

            let connected = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => break,
                result = self.connector.connect(&host, port) => result,
            };

            match connected {
                Ok(conn) => {
                    info!(conn_id = %conn.id(), %host, port, "connected");
                    if self.run_session(&conn, registration).await == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.machine.fail(&e.to_string());
                    break;
                }
                Err(e) => warn!(error = %e, "connect failed"),
            }

            self.machine.connection_lost();
            match self.machine.next_retry() {
                Retry::After { attempt, wait } => {
                    info!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "reconnecting after backoff"
                    );
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut self.shutdown) => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Retry::GiveUp { .. } => break,
            }
        }

        // A stop while disconnected has nothing to send.
        let _ = self.machine.stop();
        info!(phase = %self.machine.phase(), "presence monitor stopped");
    }

    /// Runs one connection from registration until it ends.
    async fn run_session(
        &mut self,
        conn: &C::Connection,
        registration: Vec<Message>,
    ) -> SessionEnd {
        // Queries requested for an earlier connection are stale.
        while self.commands.try_recv().is_ok() {}

        for msg in &registration {
            if let Err(e) = self.send(conn, msg).await {
                warn!(error = %e, "registration failed");
                let _ = conn.close().await;
                return SessionEnd::Lost;
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    if let Some(quit) = self.machine.stop() {
                        if let Err(e) = self.send_within(conn, &quit, QUIT_TIMEOUT).await {
                            debug!(error = %e, "quit not delivered");
                        }
                    }
                    let _ = conn.close().await;
                    return SessionEnd::Shutdown;
                }
                Some(command) = self.commands.recv() => {
                    match command {
                        MonitorCommand::Query => {
                            if let Some(end) = self.start_query(conn).await {
                                return end;
                            }
                        }
                    }
                }
                line = conn.recv_line() => match line {
                    Ok(Some(bytes)) => {
                        if let Some(end) = self.on_line(conn, &bytes).await {
                            return end;
                        }
                    }
                    Ok(None) => {
                        info!(conn_id = %conn.id(), "server closed the connection");
                        return SessionEnd::Lost;
                    }
                    Err(e) => {
                        warn!(conn_id = %conn.id(), error = %e, "receive failed");
                        let _ = conn.close().await;
                        return SessionEnd::Lost;
                    }
                },
            }
        }
    }

    async fn start_query(&mut self, conn: &C::Connection) -> Option<SessionEnd> {
        let who = match self.machine.begin_query(Instant::now()) {
            Ok(who) => who,
            Err(SessionError::QueryInFlight) => {
                debug!("roster query already in flight");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "roster query skipped");
                return None;
            }
        };

        debug!(channel = %self.machine.config().channel, "roster query sent");
        if let Err(e) = self.send(conn, &who).await {
            warn!(error = %e, "failed to send roster query");
            self.machine.cancel_query();
            let _ = conn.close().await;
            return Some(SessionEnd::Lost);
        }
        None
    }

    async fn on_line(&mut self, conn: &C::Connection, bytes: &[u8]) -> Option<SessionEnd> {
        let msg = match self.codec.decode(bytes) {
            Ok(msg) => msg,
            Err(ProtocolError::Empty) => return None,
            Err(e) => {
                warn!(error = %e, "skipping undecodable line");
                return None;
            }
        };
        trace!(command = %msg.command, "recv");

        for action in self.machine.handle(&msg) {
            match action {
                Action::Send(reply) => {
                    if let Err(e) = self.send(conn, &reply).await {
                        warn!(error = %e, "send failed");
                        let _ = conn.close().await;
                        return Some(SessionEnd::Lost);
                    }
                }
                Action::Quit(reason) => {
                    if let Err(e) = self.send(conn, &Message::quit(&reason)).await {
                        debug!(error = %e, "quit not delivered");
                    }
                    let _ = conn.close().await;
                    return Some(SessionEnd::Lost);
                }
                Action::Close(reason) => {
                    info!(%reason, "server ended the session");
                    let _ = conn.close().await;
                    return Some(SessionEnd::Lost);
                }
            }
        }
        None
    }

    async fn send(&self, conn: &C::Connection, msg: &Message) -> Result<(), RosterwatchError> {
        self.send_within(conn, msg, SEND_TIMEOUT).await
    }

    async fn send_within(
        &self,
        conn: &C::Connection,
        msg: &Message,
        limit: Duration,
    ) -> Result<(), RosterwatchError> {
        let line = self.codec.encode(msg)?;
        match tokio::time::timeout(limit, conn.send_line(&line)).await {
            Ok(sent) => Ok(sent?),
            Err(_) => {
                Err(TransportError::SendFailed(io::Error::from(io::ErrorKind::TimedOut)).into())
            }
        }
    }
}

/// Resolves once stop is requested or every handle is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
