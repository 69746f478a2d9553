//! The presence monitor: a network thread plus the handles that talk to it.
//!
//! [`PresenceMonitor::start`] spawns a std thread named `presence-monitor`
//! that owns a current-thread tokio runtime and the session machine. The
//! host keeps [`MonitorHandle`]s, which only
//!
//! - read the phase and attempt counters (atomics),
//! - clone the latest roster `Arc` out of the cache, and
//! - push commands over an unbounded channel.
//!
//! None of those can block, so the host's event loop never waits on the
//! network.

use std::sync::Arc;
use std::thread::JoinHandle;

use rosterwatch_session::{Phase, RosterSnapshot, SessionConfig, SessionMachine, SharedStatus};
use rosterwatch_transport::Connector;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::RosterwatchError;
use crate::supervisor::Supervisor;

/// Name of the network thread.
pub const THREAD_NAME: &str = "presence-monitor";

/// Work the host asks the network thread to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorCommand {
    /// Send a WHO for the configured channel.
    Query,
}

/// A cheap, cloneable view of a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    shared: Arc<SharedStatus>,
    commands: mpsc::UnboundedSender<MonitorCommand>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl MonitorHandle {
    /// Asks the network thread to start a roster query.
    ///
    /// Returns `false` without queueing anything when the session is not
    /// joined yet, or when the network thread is gone. The thread may
    /// still decline the query, e.g. while a previous one is in flight.
    pub fn request_roster_query(&self) -> bool {
        let phase = self.shared.phase();
        if !phase.is_ready() {
            debug!(%phase, "roster query requested before join, ignoring");
            return false;
        }
        self.commands.send(MonitorCommand::Query).is_ok()
    }

    /// The latest completed roster, or `None` before the first query ends.
    pub fn current_roster(&self) -> Option<Arc<RosterSnapshot>> {
        self.shared.roster().current()
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Whether the channel is joined and queries can be sent.
    pub fn is_ready(&self) -> bool {
        self.shared.phase().is_ready()
    }

    pub fn first_query_completed(&self) -> bool {
        self.shared.roster().first_query_completed()
    }

    /// Consecutive failed connection attempts.
    pub fn attempt(&self) -> u32 {
        self.shared.attempt()
    }

    /// Signals the network thread to quit. Never blocks.
    ///
    /// The thread sends `QUIT :Bot shutting down.` if it is connected and
    /// then exits.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("presence monitor stop requested");
        }
    }

    /// Whether [`stop`](Self::stop) has been called on any handle.
    pub fn stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// A handle with no network thread behind it; commands land in the
    /// returned receiver.
    #[cfg(test)]
    pub(crate) fn detached(
        shared: Arc<SharedStatus>,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorCommand>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let handle = Self {
            shared,
            commands,
            shutdown: Arc::new(shutdown),
        };
        (handle, command_rx)
    }
}

/// Owns the network thread.
///
/// Dropping the monitor signals the thread to stop but does not wait for
/// it; call [`shutdown`](Self::shutdown) to wait.
#[derive(Debug)]
pub struct PresenceMonitor {
    handle: MonitorHandle,
    thread: Option<JoinHandle<()>>,
}

impl PresenceMonitor {
    /// Validates `config` and starts the network thread.
    ///
    /// Returns once the thread's runtime is up; the first connection
    /// attempt happens in the background.
    ///
    /// # Errors
    /// - [`RosterwatchError::Session`] for an unusable config.
    /// - [`RosterwatchError::Spawn`] if the thread or its runtime cannot
    ///   be created.
    pub fn start<C: Connector>(
        config: SessionConfig,
        connector: C,
    ) -> Result<Self, RosterwatchError> {
        config.validate()?;

        let shared = Arc::new(SharedStatus::new());
        let machine = SessionMachine::new(config, Arc::clone(&shared));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (started_tx, started_rx) = std::sync::mpsc::sync_channel(1);

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => {
                        let _ = started_tx.send(Ok(()));
                        runtime
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                let supervisor = Supervisor::new(machine, connector, command_rx, shutdown_rx);
                runtime.block_on(supervisor.run());
            })
            .map_err(RosterwatchError::Spawn)?;

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(RosterwatchError::Spawn(e));
            }
            // The thread died before reporting back.
            Err(_) => return Err(RosterwatchError::MonitorPanicked),
        }

        Ok(Self {
            handle: MonitorHandle {
                shared,
                commands: command_tx,
                shutdown: Arc::new(shutdown_tx),
            },
            thread: Some(thread),
        })
    }

    /// A handle for timers and command handlers.
    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub fn request_roster_query(&self) -> bool {
        self.handle.request_roster_query()
    }

    pub fn current_roster(&self) -> Option<Arc<RosterSnapshot>> {
        self.handle.current_roster()
    }

    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_ready()
    }

    pub fn first_query_completed(&self) -> bool {
        self.handle.first_query_completed()
    }

    pub fn attempt(&self) -> u32 {
        self.handle.attempt()
    }

    /// See [`MonitorHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Whether the network thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the monitor and waits for the network thread to exit.
    ///
    /// The join runs on tokio's blocking pool so the caller's runtime
    /// keeps going.
    ///
    /// # Errors
    /// Returns [`RosterwatchError::MonitorPanicked`] if the thread panicked.
    pub async fn shutdown(mut self) -> Result<(), RosterwatchError> {
        self.handle.stop();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => {
                info!("presence monitor thread joined");
                Ok(())
            }
            _ => Err(RosterwatchError::MonitorPanicked),
        }
    }
}

impl Drop for PresenceMonitor {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.stop();
        }
    }
}
