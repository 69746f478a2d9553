//! Typed access to `RPL_WHOREPLY` (352) fields.

use crate::{Message, ProtocolError, reply};

/// One WHO reply, parameters in wire order:
///
/// ```text
/// 352 <me> <channel> <user> <host> <server> <nick> <flags> :<hopcount> <realname>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoReply {
    pub channel: String,
    pub user: String,
    pub host: String,
    pub server: String,
    pub nick: String,
    /// `H` (here) or `G` (gone/away), optionally followed by `*`, `@`, `+`.
    pub flags: String,
    /// The free-text trailing field: hop count followed by the real name.
    pub info: String,
}

impl WhoReply {
    const PARAMS: usize = 8;

    /// Extracts the fields of a 352 reply.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidCommand`] if `msg` is not a 352 reply.
    /// - [`ProtocolError::MissingParams`] if it has fewer than 8 params.
    pub fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        if msg.numeric() != Some(reply::RPL_WHOREPLY) {
            return Err(ProtocolError::InvalidCommand(msg.command.to_string()));
        }
        if msg.params.len() < Self::PARAMS {
            return Err(ProtocolError::MissingParams {
                command: msg.command.to_string(),
                expected: Self::PARAMS,
                got: msg.params.len(),
            });
        }

        let p = &msg.params;
        Ok(Self {
            channel: p[1].clone(),
            user: p[2].clone(),
            host: p[3].clone(),
            server: p[4].clone(),
            nick: p[5].clone(),
            flags: p[6].clone(),
            info: p[p.len() - 1].clone(),
        })
    }

    /// Whether the user is marked as present rather than away.
    pub fn is_here(&self) -> bool {
        self.flags.contains('H')
    }
}
