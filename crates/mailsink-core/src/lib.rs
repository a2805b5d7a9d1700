//! # mailsink-core
//!
//! Shared plumbing for the mailsink SMTP, POP3 and IMAP servers.
//!
//! This crate provides:
//! - **Configuration** - [`ServerOptions`] loaded from a JSON settings file
//! - **Domain models** - stored messages, mailboxes and folders
//! - **Repositories** - the [`MessagesRepository`] and [`MailboxRepository`]
//!   interfaces with a `SQLite` implementation
//! - **TLS** - certificate loading for server-side handshakes
//! - **Line channel** - CRLF line I/O over a plain or TLS stream, with
//!   in-place TLS upgrade, receive timeout and cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
mod error;
pub mod model;
pub mod repository;
pub mod tls;

pub use channel::{AsyncStream, LineChannel, MAX_LINE_LENGTH};
pub use config::{ServerOptions, TlsMode, UserOptions};
pub use error::{Error, Result};
pub use model::{Folder, Mailbox, NewMessage, StoredMessage};
pub use repository::{MailboxRepository, MessagesRepository, SqliteRepository};
pub use tls::{CertificateProvider, PemCertificateProvider};

/// Name of the default mailbox used when authentication is disabled.
pub const DEFAULT_MAILBOX: &str = "Default";
