//! The session state machine: what every inbound line means.
//!
//! `SessionMachine` performs no I/O. The run loop that owns the connection
//! feeds it parsed messages and carries out the [`Action`]s it returns:
//!
//! ```text
//! begin_connect() ──→ [NICK, USER] ──→ connect + send
//!                                          │
//!     recv_line ──→ handle(msg) ──→ Vec<Action> ──→ send / quit / close
//!                                          │
//!     connection lost ──→ connection_lost() ──→ next_retry() ──→ sleep
//! ```
//!
//! # Concurrency note
//!
//! The machine is owned by the network thread alone. What other threads
//! may observe (phase, attempt, the published roster) is mirrored into a
//! shared [`SharedStatus`] on every change.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rand::Rng;
use rosterwatch_protocol::{Command, Message, WhoReply, reply};
use tracing::{debug, error, info, warn};

use crate::{
    ConnectionState, Phase, RosterEntry, RosterSnapshot, SessionConfig, SessionError, SharedStatus,
};

/// Quit reason when the server says the channel does not exist.
pub const QUIT_INVALID_CHANNEL: &str = "Invalid channel.";
/// Quit reason when the server rejects the channel key.
pub const QUIT_WRONG_KEY: &str = "Wrong key.";
/// Quit reason on a requested shutdown.
pub const QUIT_SHUTDOWN: &str = "Bot shutting down.";

/// Something the caller must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this message to the server.
    Send(Message),
    /// Send `QUIT :<reason>`, then drop the connection.
    Quit(String),
    /// Drop the connection; the server already ended the session.
    Close(String),
}

/// What to do after a connection ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Sleep for `wait`, then reconnect. `attempt` is the new failure count.
    After { attempt: u32, wait: Duration },
    /// The retry budget is spent; the machine is now [`Phase::Failed`].
    GiveUp { attempts: u32 },
}

/// WHO replies collected for a query that has not ended yet.
#[derive(Debug)]
struct PendingQuery {
    started: Instant,
    entries: Vec<RosterEntry>,
}

/// Drives one logical session through registration, join, and queries.
#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    state: ConnectionState,
    shared: Arc<SharedStatus>,
    query: Option<PendingQuery>,
    /// Nicknames the server refused during the current attempt.
    rejected_nicks: HashSet<String>,
}

impl SessionMachine {
    pub fn new(config: SessionConfig, shared: Arc<SharedStatus>) -> Self {
        let state = ConnectionState::new(&config.nickname);
        shared.set_phase(state.phase);
        shared.set_attempt(state.attempt);
        Self {
            config,
            state,
            shared,
            query: None,
            rejected_nicks: HashSet::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn shared(&self) -> &Arc<SharedStatus> {
        &self.shared
    }

    /// Whether a roster query is waiting for its end marker.
    pub fn query_in_flight(&self) -> bool {
        self.query.is_some()
    }

    /// Starts a connection attempt and returns the registration lines to
    /// send once the connection is up.
    ///
    /// Every attempt registers under the base nickname again.
    ///
    /// # Errors
    /// Returns [`SessionError::Terminal`] after `stop()` or once retries
    /// are exhausted.
    pub fn begin_connect(&mut self) -> Result<Vec<Message>, SessionError> {
        if self.state.phase.is_terminal() {
            return Err(SessionError::Terminal(self.state.phase));
        }

        self.state.nickname.clone_from(&self.config.nickname);
        self.rejected_nicks.clear();
        self.query = None;
        self.set_phase(Phase::Connecting);

        info!(
            host = %self.config.host,
            port = self.config.port,
            nickname = %self.state.nickname,
            attempt = self.state.attempt,
            "connecting"
        );

        let nick = &self.state.nickname;
        Ok(vec![Message::nick(nick), Message::user(nick, nick)])
    }

    /// Reacts to one inbound message.
    ///
    /// Never fails: anything unexpected is logged and ignored so one bad
    /// line cannot end the session.
    pub fn handle(&mut self, msg: &Message) -> Vec<Action> {
        if self.state.phase.is_terminal() {
            return Vec::new();
        }

        match &msg.command {
            Command::Ping => {
                let token = msg.trailing().unwrap_or_default();
                vec![Action::Send(Message::pong(token))]
            }
            Command::Error => {
                let reason = msg.trailing().unwrap_or("server error").to_string();
                warn!(%reason, "server closed the session");
                vec![Action::Close(reason)]
            }
            Command::Join => self.on_join(msg),
            Command::Numeric(code) => self.on_numeric(*code, msg),
            _ => Vec::new(),
        }
    }

    fn on_numeric(&mut self, code: u16, msg: &Message) -> Vec<Action> {
        match code {
            reply::RPL_WELCOME => self.on_welcome(msg),
            reply::ERR_NICKNAMEINUSE => self.on_nickname_in_use(msg),
            reply::ERR_NOSUCHCHANNEL => {
                error!(channel = %self.config.channel, "no such channel");
                vec![Action::Quit(QUIT_INVALID_CHANNEL.to_string())]
            }
            reply::ERR_BADCHANNELKEY => {
                error!(channel = %self.config.channel, "channel key rejected");
                vec![Action::Quit(QUIT_WRONG_KEY.to_string())]
            }
            reply::RPL_WHOREPLY => {
                self.on_who_reply(msg);
                Vec::new()
            }
            reply::RPL_ENDOFWHO => {
                self.on_end_of_who();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_welcome(&mut self, msg: &Message) -> Vec<Action> {
        if self.state.phase != Phase::Connecting {
            debug!(phase = %self.state.phase, "ignoring repeated welcome");
            return Vec::new();
        }

        // The server may have truncated or case-folded the nickname.
        if let Some(nick) = msg.param(0).filter(|n| !n.is_empty() && *n != "*") {
            self.state.nickname = nick.to_string();
        }
        self.set_phase(Phase::Registered);
        self.set_attempt(0);

        info!(
            nickname = %self.state.nickname,
            channel = %self.config.channel,
            "registered, joining channel"
        );
        vec![Action::Send(Message::join(
            &self.config.channel,
            self.config.channel_key.as_deref(),
        ))]
    }

    fn on_nickname_in_use(&mut self, msg: &Message) -> Vec<Action> {
        if self.state.phase != Phase::Connecting {
            debug!(phase = %self.state.phase, "ignoring nickname conflict");
            return Vec::new();
        }

        let taken = msg
            .param(1)
            .unwrap_or(self.state.nickname.as_str())
            .to_string();
        self.rejected_nicks.insert(taken.clone());
        self.rejected_nicks.insert(self.state.nickname.clone());
        self.state.nickname = self.next_nickname();

        warn!(%taken, nickname = %self.state.nickname, "nickname in use, retrying");
        vec![Action::Send(Message::nick(&self.state.nickname))]
    }

    /// Base nickname plus a random three-digit suffix not yet refused.
    fn next_nickname(&self) -> String {
        let base = &self.config.nickname;
        let mut rng = rand::rng();
        for _ in 0..32 {
            let candidate = format!("{base}{}", rng.random_range(100..=999));
            if !self.rejected_nicks.contains(&candidate) {
                return candidate;
            }
        }
        (100..=999)
            .map(|n| format!("{base}{n}"))
            .find(|c| !self.rejected_nicks.contains(c))
            .unwrap_or_else(|| format!("{base}{}", 1000 + self.rejected_nicks.len()))
    }

    fn on_join(&mut self, msg: &Message) -> Vec<Action> {
        let Some(who) = msg.source_nick() else {
            return Vec::new();
        };
        let channel = msg.param(0).unwrap_or_default();

        if !who.eq_ignore_ascii_case(&self.state.nickname) {
            debug!(%who, %channel, "join by another user");
            return Vec::new();
        }
        if !channel.eq_ignore_ascii_case(&self.config.channel) {
            debug!(%channel, "joined an unexpected channel");
            return Vec::new();
        }
        if self.state.phase != Phase::Registered {
            debug!(phase = %self.state.phase, "ignoring join confirmation");
            return Vec::new();
        }

        self.set_phase(Phase::JoinedReadyForQuery);
        info!(%channel, nickname = %self.state.nickname, "joined, ready for roster queries");
        Vec::new()
    }

    fn on_who_reply(&mut self, msg: &Message) {
        let Some(query) = self.query.as_mut() else {
            debug!("WHO reply outside a query");
            return;
        };

        match WhoReply::from_message(msg) {
            Ok(who) if who.info.contains(&self.config.game_signature) => {
                query.entries.push(RosterEntry::from_who(&who));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping malformed WHO reply"),
        }
    }

    fn on_end_of_who(&mut self) {
        let Some(query) = self.query.take() else {
            debug!("end of WHO outside a query");
            return;
        };

        let snapshot = RosterSnapshot::new(query.entries, SystemTime::now());
        debug!(
            entries = snapshot.len(),
            elapsed_ms = query.started.elapsed().as_millis() as u64,
            "roster query completed"
        );
        self.shared.roster().publish(snapshot);
    }

    /// Opens a roster query and returns the WHO message to send.
    ///
    /// A query outstanding for longer than the configured stale horizon is
    /// abandoned and replaced; the published roster is untouched.
    ///
    /// # Errors
    /// - [`SessionError::Terminal`] if the machine has stopped or failed.
    /// - [`SessionError::NotReady`] before the channel join completes.
    /// - [`SessionError::QueryInFlight`] while a fresh query is outstanding.
    pub fn begin_query(&mut self, now: Instant) -> Result<Message, SessionError> {
        let phase = self.state.phase;
        if phase.is_terminal() {
            return Err(SessionError::Terminal(phase));
        }
        if !phase.is_ready() {
            return Err(SessionError::NotReady(phase));
        }

        if let Some(pending) = &self.query {
            let age = now.saturating_duration_since(pending.started);
            if age < self.config.query_stale_after() {
                return Err(SessionError::QueryInFlight);
            }
            warn!(
                age_ms = age.as_millis() as u64,
                buffered = pending.entries.len(),
                "abandoning stale roster query"
            );
        }

        self.query = Some(PendingQuery {
            started: now,
            entries: Vec::new(),
        });
        Ok(Message::who(&self.config.channel))
    }

    /// Drops the outstanding query, e.g. when the WHO could not be sent.
    pub fn cancel_query(&mut self) {
        if let Some(q) = self.query.take() {
            debug!(buffered = q.entries.len(), "roster query cancelled");
        }
    }

    /// Records the end of the current connection.
    ///
    /// Buffered query entries are discarded; the published roster stays.
    pub fn connection_lost(&mut self) {
        self.cancel_query();
        self.state.last_disconnect = Some(SystemTime::now());
        if !self.state.phase.is_terminal() {
            self.set_phase(Phase::Disconnected);
        }
    }

    /// Decides whether and when to reconnect.
    ///
    /// Counts one more consecutive failure. Once the budget is spent the
    /// machine becomes [`Phase::Failed`] for good.
    pub fn next_retry(&mut self) -> Retry {
        let policy = self.config.backoff;
        let attempt = self.state.attempt;

        if policy.is_exhausted(attempt) {
            self.cancel_query();
            self.set_phase(Phase::Failed);
            error!(attempts = attempt, "reconnect attempts exhausted, giving up");
            return Retry::GiveUp { attempts: attempt };
        }

        let wait = policy.wait_for(attempt);
        self.set_attempt(attempt.saturating_add(1));
        Retry::After {
            attempt: self.state.attempt,
            wait,
        }
    }

    /// Moves to [`Phase::Failed`] without spending the retry budget, for
    /// errors no reconnect can fix.
    pub fn fail(&mut self, reason: &str) {
        self.cancel_query();
        if !self.state.phase.is_terminal() {
            error!(%reason, "presence monitor failed");
            self.set_phase(Phase::Failed);
        }
    }

    /// Moves to [`Phase::Stopped`].
    ///
    /// Returns the QUIT to send if a connection is still open. A machine
    /// that already failed stays [`Phase::Failed`].
    pub fn stop(&mut self) -> Option<Message> {
        if self.state.phase.is_terminal() {
            return None;
        }
        let connected = self.state.phase != Phase::Disconnected;
        self.cancel_query();
        self.set_phase(Phase::Stopped);
        connected.then(|| Message::quit(QUIT_SHUTDOWN))
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            debug!(from = %self.state.phase, to = %phase, "phase change");
        }
        self.state.phase = phase;
        self.shared.set_phase(phase);
    }

    fn set_attempt(&mut self, attempt: u32) {
        self.state.attempt = attempt;
        self.shared.set_attempt(attempt);
    }
}
