//! Wire protocol for Rosterwatch.
//!
//! This crate defines the small slice of the IRC line protocol that the
//! presence monitor speaks:
//!
//! - **Message model** ([`Message`], [`Prefix`], [`Command`]): one parsed
//!   line with its source prefix, command or three-digit numeric, and
//!   parameters (the last may be `:`-prefixed free text).
//! - **Replies** ([`reply`], [`WhoReply`]): the numerics the monitor
//!   reacts to and typed access to WHO reply fields.
//! - **Codec** ([`Codec`] trait, [`LineCodec`]): how a [`Message`] is
//!   turned into a line of bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing or
//!   encoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and session
//! (registration and roster state). It doesn't know about sockets or
//! reconnects; it only knows how to read and write lines.
//!
//! ```text
//! Transport (lines) → Protocol (Message) → Session (state machine)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod message;
pub mod reply;
mod who;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, LineCodec};
pub use error::ProtocolError;
pub use message::{Command, Message, Prefix};
pub use who::WhoReply;
