//! The parsed form of one protocol line.
//!
//! A line looks like:
//!
//! ```text
//! [@tags ][:prefix ]COMMAND [param ...][ :trailing param]
//! ```
//!
//! Tags (IRCv3) are accepted and ignored. The prefix names the source of
//! the message, either a server name or `nick!user@host`.

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Prefix
// ---------------------------------------------------------------------------

/// The source of a message.
///
/// For server-originated lines only `name` is set (the server name). For
/// user-originated lines `name` is the nickname and `user`/`host` carry the
/// rest of the `nick!user@host` mask when the server sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    fn parse(raw: &str) -> Self {
        let (rest, host) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (raw, None),
        };
        let (name, user) = match rest.split_once('!') {
            Some((name, user)) => (name, Some(user.to_string())),
            None => (rest, None),
        };
        Self {
            name: name.to_string(),
            user,
            host,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The verb of a message.
///
/// Only the commands the monitor sends or reacts to get their own variant;
/// anything else is kept verbatim in [`Command::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick,
    User,
    Join,
    Who,
    Ping,
    Pong,
    Quit,
    Error,
    /// A three-digit server reply. See [`crate::reply`].
    Numeric(u16),
    /// Any other command word, upper-cased.
    Other(String),
}

impl Command {
    fn parse(token: &str) -> Result<Self, ProtocolError> {
        if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
            let code = token
                .parse()
                .map_err(|_| ProtocolError::InvalidCommand(token.to_string()))?;
            return Ok(Self::Numeric(code));
        }
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ProtocolError::InvalidCommand(token.to_string()));
        }

        let upper = token.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "NICK" => Self::Nick,
            "USER" => Self::User,
            "JOIN" => Self::Join,
            "WHO" => Self::Who,
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            "QUIT" => Self::Quit,
            "ERROR" => Self::Error,
            _ => Self::Other(upper),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nick => f.write_str("NICK"),
            Self::User => f.write_str("USER"),
            Self::Join => f.write_str("JOIN"),
            Self::Who => f.write_str("WHO"),
            Self::Ping => f.write_str("PING"),
            Self::Pong => f.write_str("PONG"),
            Self::Quit => f.write_str("QUIT"),
            Self::Error => f.write_str("ERROR"),
            Self::Numeric(code) => write!(f, "{code:03}"),
            Self::Other(word) => f.write_str(word),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: Command,
    pub params: Vec<String>,
}

impl Message {
    /// Creates a prefix-less message, the form every client-sent line takes.
    pub fn new(command: Command, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command,
            params,
        }
    }

    /// `NICK <nickname>`
    pub fn nick(nickname: &str) -> Self {
        Self::new(Command::Nick, vec![nickname.to_string()])
    }

    /// `USER <username> 0 * :<realname>`
    pub fn user(username: &str, realname: &str) -> Self {
        Self::new(
            Command::User,
            vec![
                username.to_string(),
                "0".to_string(),
                "*".to_string(),
                realname.to_string(),
            ],
        )
    }

    /// `JOIN <channel> [<key>]`
    pub fn join(channel: &str, key: Option<&str>) -> Self {
        let mut params = vec![channel.to_string()];
        if let Some(key) = key {
            params.push(key.to_string());
        }
        Self::new(Command::Join, params)
    }

    /// `WHO <mask>`
    pub fn who(mask: &str) -> Self {
        Self::new(Command::Who, vec![mask.to_string()])
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Self {
        Self::new(Command::Pong, vec![token.to_string()])
    }

    /// `QUIT :<reason>`
    pub fn quit(reason: &str) -> Self {
        Self::new(Command::Quit, vec![reason.to_string()])
    }

    /// The numeric code, if this is a server reply.
    pub fn numeric(&self) -> Option<u16> {
        match self.command {
            Command::Numeric(code) => Some(code),
            _ => None,
        }
    }

    /// The nickname (or server name) the message came from.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.name.as_str())
    }

    /// The `index`-th parameter.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which is where free text lives.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Renders the message as one line without a terminator.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidParam`] if a parameter contains a
    /// line break or NUL, or if a middle parameter is empty, contains a
    /// space, or starts with `:`.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = String::new();
        if let Some(prefix) = &self.prefix {
            line.push(':');
            line.push_str(&prefix.to_string());
            line.push(' ');
        }
        line.push_str(&self.command.to_string());

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            if param.contains(['\r', '\n', '\0']) {
                return Err(ProtocolError::InvalidParam(param.clone()));
            }
            let needs_colon =
                param.is_empty() || param.contains(' ') || param.starts_with(':');
            line.push(' ');
            if needs_colon {
                if i != last {
                    return Err(ProtocolError::InvalidParam(param.clone()));
                }
                line.push(':');
            }
            line.push_str(param);
        }
        Ok(line)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();
        if rest.is_empty() {
            return Err(ProtocolError::Empty);
        }

        if rest.starts_with('@') {
            rest = match rest.split_once(' ') {
                Some((_, after)) => after.trim_start(),
                None => return Err(ProtocolError::MissingCommand),
            };
        }

        let mut prefix = None;
        if let Some(after_colon) = rest.strip_prefix(':') {
            let (raw, after) = match after_colon.split_once(' ') {
                Some(split) => split,
                None => return Err(ProtocolError::MissingCommand),
            };
            prefix = Some(Prefix::parse(raw));
            rest = after.trim_start();
        }

        let (token, mut rest) = match rest.split_once(' ') {
            Some((token, after)) => (token, after),
            None => (rest, ""),
        };
        if token.is_empty() {
            return Err(ProtocolError::MissingCommand);
        }
        let command = Command::parse(token)?;

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Self {
            prefix,
            command,
            params,
        })
    }
}
