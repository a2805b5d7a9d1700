//! Per-connection session record.

use chrono::{DateTime, Utc};

use crate::auth::AuthenticationCredentials;
use crate::message::Message;

/// Why a session ended abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The transport failed or the client vanished.
    NetworkError,
    /// Anything else.
    UnexpectedError,
}

/// State of one SMTP connection.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Session {
    /// When the connection was accepted.
    pub start_date: DateTime<Utc>,
    /// When the connection closed.
    pub end_date: Option<DateTime<Utc>>,
    /// Peer address.
    pub client_address: String,
    /// Name from HELO/EHLO; `None` until the client greets.
    pub client_name: Option<String>,
    /// Whether the transport is encrypted.
    pub secure_connection: bool,
    /// Whether AUTH succeeded.
    pub authenticated: bool,
    /// Credentials from the successful AUTH.
    pub credentials: Option<AuthenticationCredentials>,
    /// Whether the client ended with QUIT.
    pub completed_normally: bool,
    /// Error that ended the session, if any.
    pub session_error: Option<String>,
    /// Classification of `session_error`.
    pub session_error_kind: Option<SessionErrorKind>,
    log: Vec<String>,
    messages: Vec<Message>,
}

impl Session {
    /// Creates a session for a new connection.
    #[must_use]
    pub fn new(client_address: impl Into<String>) -> Self {
        Self {
            start_date: Utc::now(),
            end_date: None,
            client_address: client_address.into(),
            client_name: None,
            secure_connection: false,
            authenticated: false,
            credentials: None,
            completed_normally: false,
            session_error: None,
            session_error_kind: None,
            log: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Appends a line to the transcript.
    pub fn append_to_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Returns the transcript.
    #[must_use]
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Records a committed message.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the messages committed in this session.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
