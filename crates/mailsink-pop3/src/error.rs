//! Error types for POP3 sessions.

use std::io;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 session error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel, TLS or storage failure from the core library.
    #[error(transparent)]
    Core(#[from] mailsink_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Core(inner) => inner.is_transport(),
            Self::Io(_) => true,
        }
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
    fn storage_errors_are_not_transport() {
        let err = Error::from(mailsink_core::Error::MessageNotFound(7));
        assert!(!err.is_transport());
    }

    #[test]
    fn io_errors_are_transport() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.is_transport());
        assert!(Error::from(mailsink_core::Error::Timeout).is_transport());
    }
}
