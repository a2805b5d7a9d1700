//! Error types for SMTP sessions.

use std::io;

use crate::types::{ReplyCode, SmtpResponse};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP session error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Protocol-level failure carrying the exact response to send.
    ///
    /// The connection loop writes the response and keeps the session open.
    #[error("SMTP {}: {}", .0.code, .0.message_text())]
    Response(SmtpResponse),

    /// Channel, TLS or storage failure from the core library.
    #[error(transparent)]
    Core(#[from] mailsink_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The client closed the connection mid-command.
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Server misconfiguration detected at runtime.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a protocol error from a reply code and message.
    #[must_use]
    pub fn response(code: ReplyCode, message: impl Into<String>) -> Self {
        Self::Response(SmtpResponse::new(code, message))
    }

    /// Returns true if the client sent a line over the channel's limit.
    #[must_use]
    pub const fn is_line_too_long(&self) -> bool {
        matches!(self, Self::Core(mailsink_core::Error::LineTooLong(_)))
    }

    /// Returns true if the peer or transport went away.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        match self {
            Self::Core(inner) => inner.is_transport(),
            Self::Io(_) | Self::ConnectionClosed => true,
            Self::Response(_) | Self::Config(_) => false,
        }
    }
}

impl From<SmtpResponse> for Error {
    fn from(response: SmtpResponse) -> Self {
        Self::Response(response)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn response_error_display() {
        let err = Error::response(ReplyCode::BAD_SEQUENCE, "Bad sequence of commands");
        assert_eq!(err.to_string(), "SMTP 503: Bad sequence of commands");
        assert!(!err.is_network());
    }

    #[test]
    fn network_errors() {
        assert!(Error::ConnectionClosed.is_network());
        assert!(Error::Core(mailsink_core::Error::Timeout).is_network());
        assert!(!Error::Core(mailsink_core::Error::InvalidState("x".into())).is_network());
    }

    #[test]
    fn overlong_line_is_recoverable() {
        let err = Error::Core(mailsink_core::Error::LineTooLong(1024));
        assert!(err.is_line_too_long());
        assert!(!err.is_network());
        assert!(!Error::ConnectionClosed.is_line_too_long());
    }
}
