//! Error types for the IMAP server.

use thiserror::Error;

use crate::search::SearchError;

/// Errors that can occur while serving an IMAP session.
#[derive(Debug, Error)]
pub enum Error {
    /// Repository, channel or configuration failure.
    #[error(transparent)]
    Core(#[from] mailsink_core::Error),

    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client command could not be parsed.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Search criteria the translator cannot express.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Protocol violation or oversized input.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the connection itself failed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Core(inner) => inner.is_transport(),
            Self::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_transport_classification() {
        assert!(Error::from(std::io::Error::other("reset")).is_transport());
        assert!(Error::Core(mailsink_core::Error::Timeout).is_transport());
        assert!(
            !Error::Parse {
                position: 3,
                message: "Expected SP".to_string()
            }
            .is_transport()
        );
        assert!(!Error::from(SearchError::NotSupported("LARGER".to_string())).is_transport());
    }
}
