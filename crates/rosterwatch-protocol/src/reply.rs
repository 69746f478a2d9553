//! Numeric replies the presence monitor reacts to.
//!
//! Numbers follow RFC 2812 section 5.

/// Registration accepted. The first line after a successful handshake.
pub const RPL_WELCOME: u16 = 1;

/// End of a WHO listing.
pub const RPL_ENDOFWHO: u16 = 315;

/// One WHO listing entry.
pub const RPL_WHOREPLY: u16 = 352;

/// The channel does not exist.
pub const ERR_NOSUCHCHANNEL: u16 = 403;

/// The requested nickname is taken.
pub const ERR_NICKNAMEINUSE: u16 = 433;

/// The channel key was missing or wrong.
pub const ERR_BADCHANNELKEY: u16 = 475;
