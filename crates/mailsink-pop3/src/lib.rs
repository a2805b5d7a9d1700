//! # mailsink-pop3
//!
//! POP3 (RFC 1939) access to the messages mailsink has captured.
//!
//! ## Features
//!
//! - **Command handlers**: USER, PASS, STAT, LIST, UIDL, RETR, TOP, DELE,
//!   RSET, NOOP, CAPA, STLS and QUIT behind a case-insensitive
//!   [`CommandMap`]
//! - **Binary-safe transfer**: [`codec`] dot-stuffs raw bytes split at CRLF
//! - **TLS**: STLS upgrade and implicit-TLS listeners
//!
//! Message numbers are positions in repository order and deletions take
//! effect immediately.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod context;
mod error;
pub mod handlers;
pub mod server;
pub mod session;

pub use context::Pop3SessionContext;
pub use error::{Error, Result};
pub use handlers::{CommandHandler, CommandMap, Pop3Outcome};
pub use server::Pop3Server;
pub use session::run_session;
