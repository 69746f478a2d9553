//! Session types: configuration, lifecycle phase, and connection state.
//!
//! The monitor keeps exactly one logical session with the chat server. This
//! module records:
//! - WHERE to connect and WHO to be (`SessionConfig`)
//! - WHICH step of the handshake the session is at (`Phase`)
//! - the identity and failure count of the current attempt
//!   (`ConnectionState`)

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{BackoffPolicy, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the presence monitor's session.
///
/// Defaults point at the public network the monitor was built for. Every
/// field can be overridden from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Base nickname. Conflicts append a random numeric suffix to this.
    pub nickname: String,
    /// Channel to join and query.
    pub channel: String,
    /// Channel key, if the channel requires one.
    pub channel_key: Option<String>,
    /// Substring of the WHO reply's trailing field that marks a user as
    /// running the target game.
    pub game_signature: String,
    /// How long an unanswered roster query blocks new ones, in seconds.
    pub query_stale_after_secs: f64,
    /// Reconnect policy.
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "irc.gamesurge.net".to_string(),
            port: 6667,
            nickname: "D2kPlayerMonitor".to_string(),
            channel: "#cncnet".to_string(),
            channel_key: None,
            game_signature: "3 1.40 d2".to_string(),
            query_stale_after_secs: 60.0,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// The stale-query horizon as a `Duration`.
    pub fn query_stale_after(&self) -> Duration {
        Duration::try_from_secs_f64(self.query_stale_after_secs).unwrap_or(Duration::ZERO)
    }

    /// Checks the fields a session cannot run without.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SessionError> {
        let bad = |msg: &str| Err(SessionError::InvalidConfig(msg.to_string()));

        if self.host.trim().is_empty() {
            return bad("host must not be empty");
        }
        if self.port == 0 {
            return bad("port must not be zero");
        }
        if self.nickname.is_empty() || self.nickname.contains([' ', ':', '\r', '\n']) {
            return bad("nickname must be a single non-empty word");
        }
        if self.channel.len() < 2 || !self.channel.starts_with(['#', '&']) {
            return bad("channel must start with '#' or '&'");
        }
        if self.channel.contains([' ', ',', '\r', '\n']) {
            return bad("channel must be a single word");
        }
        if self
            .channel_key
            .as_deref()
            .is_some_and(|k| k.is_empty() || k.contains([' ', '\r', '\n']))
        {
            return bad("channel key must be a single non-empty word");
        }
        if self.game_signature.is_empty() {
            return bad("game signature must not be empty");
        }
        if !(positive_secs(self.backoff.base_wait_secs)
            && positive_secs(self.backoff.max_wait_secs)
            && self.backoff.max_wait_secs >= self.backoff.base_wait_secs)
        {
            return bad("backoff needs 0 < base_wait_secs <= max_wait_secs");
        }
        if !positive_secs(self.query_stale_after_secs) {
            return bad("query_stale_after_secs must be a positive number of seconds");
        }
        Ok(())
    }
}

/// Whether `secs` is positive and fits in a `Duration`.
fn positive_secs(secs: f64) -> bool {
    secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///                  ┌──────────── nickname in use ───┐
///                  ▼                                │
/// Disconnected ──→ Connecting ──(welcome)──→ Registered ──(own JOIN)──→ JoinedReadyForQuery
///      ▲               │                         │                          │
///      └───────────────┴──── disconnect / rejected channel ─────────────────┘
///
/// any ──(retries exhausted)──→ Failed        any ──(stop)──→ Stopped
/// ```
///
/// `JoinedReadyForQuery` implies the session passed `Registered`, which
/// implies it passed `Connecting`. `Failed` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    Disconnected = 0,
    Connecting = 1,
    Registered = 2,
    JoinedReadyForQuery = 3,
    Failed = 4,
    Stopped = 5,
}

impl Phase {
    /// Returns `true` if roster queries may be sent.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::JoinedReadyForQuery)
    }

    /// Returns `true` if the server has accepted the registration.
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered | Self::JoinedReadyForQuery)
    }

    /// Returns `true` if the session will never run again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Inverse of `phase as u8`, for the atomic handoff in
    /// [`SharedStatus`](crate::SharedStatus).
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Registered,
            3 => Self::JoinedReadyForQuery,
            4 => Self::Failed,
            5 => Self::Stopped,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Registered => write!(f, "Registered"),
            Self::JoinedReadyForQuery => write!(f, "JoinedReadyForQuery"),
            Self::Failed => write!(f, "Failed"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// State of the current connection attempt.
///
/// Owned by the [`SessionMachine`](crate::SessionMachine) and mutated only
/// from the network thread. Other threads see the phase and attempt count
/// through [`SharedStatus`](crate::SharedStatus).
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub(crate) phase: Phase,
    pub(crate) nickname: String,
    pub(crate) attempt: u32,
    pub(crate) last_disconnect: Option<SystemTime>,
}

impl ConnectionState {
    pub(crate) fn new(nickname: &str) -> Self {
        Self {
            phase: Phase::Disconnected,
            nickname: nickname.to_string(),
            attempt: 0,
            last_disconnect: None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Nickname in use (or being registered). Never empty.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Consecutive failed connection attempts since the last registration.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// When the last connection ended. Informational only.
    pub fn last_disconnect(&self) -> Option<SystemTime> {
        self.last_disconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_u8_conversion_covers_every_variant() {
        for phase in [
            Phase::Disconnected,
            Phase::Connecting,
            Phase::Registered,
            Phase::JoinedReadyForQuery,
            Phase::Failed,
            Phase::Stopped,
        ] {
            assert_eq!(Phase::from_u8(phase as u8), phase);
        }
    }

    #[test]
    fn test_phase_ready_implies_registered() {
        assert!(Phase::JoinedReadyForQuery.is_ready());
        assert!(Phase::JoinedReadyForQuery.is_registered());
        assert!(Phase::Registered.is_registered());
        assert!(!Phase::Registered.is_ready());
        assert!(!Phase::Connecting.is_registered());
    }

    #[test]
    fn test_phase_terminal_variants() {
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Stopped.is_terminal());
        assert!(!Phase::Disconnected.is_terminal());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_nickname() {
        let config = SessionConfig {
            nickname: String::new(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_channel_without_sigil() {
        let config = SessionConfig {
            channel: "cncnet".into(),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_key_with_space() {
        let config = SessionConfig {
            channel_key: Some("two words".into()),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_base_wait() {
        let config = SessionConfig {
            backoff: BackoffPolicy {
                base_wait_secs: 0.0,
                ..BackoffPolicy::default()
            },
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_max_wait_beyond_duration_range() {
        let config = SessionConfig {
            backoff: BackoffPolicy {
                max_wait_secs: 1e20,
                ..BackoffPolicy::default()
            },
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_stale_horizon() {
        for secs in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e20] {
            let config = SessionConfig {
                query_stale_after_secs: secs,
                ..SessionConfig::default()
            };
            assert!(config.validate().is_err(), "{secs}");
        }
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: SessionConfig = serde_json::from_str(
            r##"{ "channel": "#d2k", "backoff": { "max_retries": 5 } }"##,
        )
        .unwrap();

        assert_eq!(config.channel, "#d2k");
        assert_eq!(config.backoff.max_retries, 5);
        // Unset fields keep their defaults.
        assert_eq!(config.port, 6667);
        assert_eq!(config.backoff.base_wait_secs, 1.0);
    }
}
