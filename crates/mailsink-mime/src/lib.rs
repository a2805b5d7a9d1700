//! # mailsink-mime
//!
//! Header-block parsing for messages captured by mailsink.
//!
//! The protocol engines never decode message bodies. They only need the
//! envelope-ish fields a stored message is indexed by: `From`, `To`,
//! `Subject` and `Date`. This crate reads the header block of a raw RFC 5322
//! message, unfolds continuation lines, decodes RFC 2047 encoded words and
//! extracts bare addresses from address lists.
//!
//! ## Quick Start
//!
//! ```
//! use mailsink_mime::Message;
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             To: bob@example.com, carol@example.com\r\n\
//!             Subject: =?utf-8?B?SMOpbGxv?=\r\n\
//!             \r\n\
//!             Hi!\r\n";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.from().as_deref(), Some("alice@example.com"));
//! assert_eq!(message.to(), vec!["bob@example.com", "carol@example.com"]);
//! assert_eq!(message.subject().as_deref(), Some("Héllo"));
//! assert_eq!(message.body(), b"Hi!\r\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{extract_addresses, parse_mailbox};
pub use error::{Error, Result};
pub use header::{HeaderField, Headers};
pub use message::Message;
