//! # mailsink-imap
//!
//! IMAP4rev1 access to the messages mailsink has captured.
//!
//! ## Features
//!
//! - **Command parser**: tagged client commands with quoted strings,
//!   synchronizing and non-synchronizing literals, `UID` forms and nested
//!   search criteria
//! - **Search translation**: [`search::translate`] turns a search-key tree
//!   into a [`search::Filter`] over stored messages; unsupported keys are a
//!   typed error answered with `NO`
//! - **Event model**: the [`session`] loop raises one event per command on
//!   an [`ImapEvents`] implementation; [`SessionHandler`] answers them from
//!   the repository
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── LOGIN ──→ Authenticated ── SELECT/EXAMINE ──→ Selected
//!                                     ↑                                │
//!                                     └──────────── CLOSE ─────────────┘
//! ```
//!
//! `INBOX` is the root folder of the session's mailbox; other folders are
//! paths separated by `/`. Flags other than `\Seen` live only in the
//! session, and `\Deleted` removes the message at once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod events;
pub mod fetch;
pub mod framed;
pub mod handler;
pub mod parser;
pub mod search;
pub mod selected;
pub mod server;
pub mod session;
pub mod types;

pub use error::{Error, Result};
pub use events::ImapEvents;
pub use handler::SessionHandler;
pub use parser::{Command, CommandKind, CommandParser};
pub use search::{Filter, SearchError, SearchKey};
pub use selected::{MessageInfo, SelectedMailbox};
pub use server::ImapServer;
pub use session::run_session;
pub use types::{Flag, Response, ResponseCode, SequenceSet, Status};
