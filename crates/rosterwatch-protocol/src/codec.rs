//! Codec trait and the line codec.
//!
//! A "codec" (coder/decoder) converts between [`Message`] and the raw bytes
//! of one line. The session loop only depends on the [`Codec`] trait, so a
//! test can swap in a codec that records or mangles lines.

use crate::{Message, ProtocolError};

/// Converts messages to line bytes and back.
///
/// Line terminators are the transport's business: `encode` output has none
/// and `decode` input is expected to have had it stripped (a stray `\r` is
/// tolerated).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a message into one line.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidParam`] if a parameter cannot be
    /// represented on the wire.
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Parses one line.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidUtf8`] for undecodable bytes and the
    /// syntax variants for lines that don't parse.
    fn decode(&self, line: &[u8]) -> Result<Message, ProtocolError>;
}

// ---------------------------------------------------------------------------
// LineCodec
// ---------------------------------------------------------------------------

/// The textual IRC line format.
///
/// ## Example
///
/// ```rust
/// use rosterwatch_protocol::{Codec, LineCodec, Message};
///
/// let codec = LineCodec;
///
/// let bytes = codec.encode(&Message::who("#cncnet")).unwrap();
/// assert_eq!(bytes, b"WHO #cncnet");
///
/// let msg = codec.decode(b":srv 315 me #cncnet :End of /WHO list.").unwrap();
/// assert_eq!(msg.numeric(), Some(315));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl Codec for LineCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, ProtocolError> {
        msg.to_line().map(String::into_bytes)
    }

    fn decode(&self, line: &[u8]) -> Result<Message, ProtocolError> {
        std::str::from_utf8(line)?.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_invalid_utf8_is_error() {
        let codec = LineCodec;
        let line = b":srv 352 me #c u h s nick H :3 1.40 d2 \xff\xfe";

        assert!(matches!(
            codec.decode(line),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_tolerates_stray_carriage_return() {
        let msg = LineCodec.decode(b"PING :x\r").unwrap();
        assert_eq!(msg.trailing(), Some("x"));
    }

    #[test]
    fn test_encode_then_decode_preserves_trailing_spaces() {
        let codec = LineCodec;
        let original = Message::quit("Invalid channel.");

        let decoded = codec.decode(&codec.encode(&original).unwrap()).unwrap();

        assert_eq!(decoded, original);
    }
}
