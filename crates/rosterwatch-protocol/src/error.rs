//! Error types for the protocol layer.
//!
//! Each crate in Rosterwatch defines its own error enum. When you see a
//! `ProtocolError`, the problem is in one line's syntax, not in the
//! connection that carried it.

/// Errors that can occur while parsing or encoding a line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The line is not valid UTF-8.
    ///
    /// Servers relay whatever bytes clients put in their real names, so
    /// this does happen in practice. The caller skips the line.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The line was empty or only whitespace.
    #[error("empty line")]
    Empty,

    /// A prefix (or tags) was present but no command followed it.
    #[error("missing command")]
    MissingCommand,

    /// The command token is neither a word nor a three-digit numeric.
    #[error("invalid command {0:?}")]
    InvalidCommand(String),

    /// A parameter cannot be written on the wire as given.
    ///
    /// Line breaks and NUL are never allowed; spaces and a leading `:` are
    /// only allowed in the last parameter.
    #[error("invalid parameter {0:?}")]
    InvalidParam(String),

    /// A reply carried fewer parameters than its format requires.
    #[error("{command} needs at least {expected} params, got {got}")]
    MissingParams {
        command: String,
        expected: usize,
        got: usize,
    },
}
