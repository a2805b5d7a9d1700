//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Certificate or key could not be loaded.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// No line arrived within the receive timeout.
    #[error("Receive timeout elapsed")]
    Timeout,

    /// A line ran past the channel's length limit and was discarded.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// The connection was cancelled by shutdown.
    #[error("Connection cancelled")]
    Cancelled,

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Mailbox not found.
    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    /// Folder not found.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// A stored message row could not be decoded.
    #[error("Stored message {id} is unreadable: {reason}")]
    CorruptMessage {
        /// Row id.
        id: i64,
        /// What failed to decode.
        reason: String,
    },

    /// Message not found.
    #[error("Message not found: {0}")]
    MessageNotFound(i64),
}

impl Error {
    /// Returns true if this error means the peer or transport went away.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout | Self::Cancelled | Self::Tls(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
