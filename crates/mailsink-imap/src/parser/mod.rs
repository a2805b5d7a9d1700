//! IMAP client command parser.
//!
//! - **Lexer**: tokenizes a complete command (atoms, strings, literals)
//! - **Command parser**: builds a [`Command`] from the tokens
//!
//! # Example
//!
//! ```
//! use mailsink_imap::parser::{CommandKind, CommandParser};
//!
//! let command = CommandParser::parse(b"a1 SELECT INBOX").unwrap();
//! assert_eq!(command.tag, "a1");
//! assert!(matches!(command.kind, CommandKind::Select { read_only: false, .. }));
//! ```

pub mod command;
pub mod lexer;
mod search;

pub use command::{Command, CommandKind, CommandParser, FetchAttribute, Section, StatusItem};
pub use lexer::{Lexer, Token};
