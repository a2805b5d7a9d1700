//! # mailsink-smtp
//!
//! The SMTP receiving side of mailsink: a server that accepts everything it
//! is sent and hands each message to its [`ServerBehaviour`].
//!
//! ## Features
//!
//! - **Verb dispatch**: case-insensitive [`VerbMap`] with sub-verb maps for
//!   `MAIL FROM` and `RCPT TO`
//! - **Extensions**: AUTH, STARTTLS, SIZE, 8BITMIME and SMTPUTF8, each
//!   contributing EHLO keywords and verbs per connection
//! - **Authentication**: CRAM-MD5, LOGIN, PLAIN, ANONYMOUS and XOAUTH2
//!   mechanism state machines
//! - **TLS**: implicit TLS and in-place STARTTLS upgrade
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailsink_core::ServerOptions;
//! use mailsink_smtp::{OptionsServerBehaviour, SmtpServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mailsink_smtp::Result<()> {
//!     let options = Arc::new(ServerOptions::default());
//!     let (behaviour, mut messages) = OptionsServerBehaviour::new(options, None);
//!
//!     let listener = SmtpServer::bind("127.0.0.1:2525".parse().unwrap()).await?;
//!     let server = SmtpServer::new(Arc::new(behaviour), CancellationToken::new());
//!     tokio::spawn(async move { server.run(listener).await });
//!
//!     while let Some(message) = messages.recv().await {
//!         println!("{} -> {:?}", message.from, message.recipients);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: SASL mechanism processors and credentials
//! - [`command`]: Command-line parser
//! - [`connection`]: Per-connection state machine
//! - [`extensions`]: Service extensions
//! - [`verbs`]: Core verbs and the dispatch map
//! - [`types`]: Reply codes, responses and mechanism names

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod behaviour;
pub mod command;
pub mod connection;
mod error;
pub mod extensions;
pub mod message;
pub mod parameters;
pub mod server;
pub mod session;
pub mod types;
pub mod verbs;

pub use behaviour::{OptionsServerBehaviour, ServerBehaviour};
pub use command::SmtpCommand;
pub use connection::Connection;
pub use error::{Error, Result};
pub use message::{Message, MessageBuilder};
pub use server::SmtpServer;
pub use session::{Session, SessionErrorKind};
pub use types::{AuthMechanism, ReplyClass, ReplyCode, SmtpResponse};
pub use verbs::{Flow, Verb, VerbMap};
