//! SMTP verbs and the verb dispatch map.

mod data;
mod helo;
mod mail;
mod rcpt;
mod simple;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use data::DataVerb;
pub use helo::{EhloVerb, HeloVerb};
pub use mail::{MailFromVerb, MailVerb};
pub use rcpt::{RcptToVerb, RcptVerb};
pub use simple::{NoopVerb, QuitVerb, RsetVerb};

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::ReplyCode;

/// What the connection loop does after a verb returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Stop reading and close the connection.
    Close,
}

/// Boxed future returned by [`Verb::process`].
pub type VerbFuture<'a> = Pin<Box<dyn Future<Output = Result<Flow>> + Send + 'a>>;

/// Handler for one SMTP verb.
pub trait Verb: Send + Sync {
    /// Processes a command, writing any responses through the connection.
    ///
    /// An `Err(Error::Response(..))` is written by the caller and the
    /// session continues; any other error ends the session.
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a>;
}

/// Case-insensitive verb-name registry.
#[derive(Clone, Default)]
pub struct VerbMap {
    verbs: HashMap<String, Arc<dyn Verb>>,
}

impl std::fmt::Debug for VerbMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.verbs.keys()).finish()
    }
}

impl VerbMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the handler for `verb`.
    pub fn set_verb_processor(&mut self, verb: &str, processor: impl Verb + 'static) {
        self.verbs.insert(verb.to_ascii_uppercase(), Arc::new(processor));
    }

    /// Looks up the handler for `verb`.
    #[must_use]
    pub fn get_verb_processor(&self, verb: &str) -> Option<Arc<dyn Verb>> {
        self.verbs.get(&verb.to_ascii_uppercase()).cloned()
    }

    /// Returns the core RFC 5321 verbs.
    #[must_use]
    pub fn standard() -> Self {
        let mut map = Self::new();
        map.set_verb_processor("HELO", HeloVerb);
        map.set_verb_processor("EHLO", EhloVerb);
        map.set_verb_processor("MAIL", MailVerb::new());
        map.set_verb_processor("RCPT", RcptVerb::new());
        map.set_verb_processor("DATA", DataVerb);
        map.set_verb_processor("RSET", RsetVerb);
        map.set_verb_processor("NOOP", NoopVerb);
        map.set_verb_processor("QUIT", QuitVerb);
        map
    }

    /// Dispatches the arguments of a compound verb (`MAIL FROM`, `RCPT TO`)
    /// into this map.
    ///
    /// # Errors
    ///
    /// Returns `504` if the sub-verb is not registered.
    pub async fn dispatch_sub_verb(&self, connection: &mut Connection, command: &SmtpCommand) -> Result<Flow> {
        let sub_command = SmtpCommand::parse(command.arguments_text());
        let processor = sub_command
            .is_valid()
            .then(|| self.get_verb_processor(sub_command.verb()))
            .flatten()
            .ok_or_else(|| {
                Error::response(
                    ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                    format!("Subcommand {} not implemented", sub_command.verb()),
                )
            })?;
        processor.process(connection, &sub_command).await
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
    fn lookup_is_case_insensitive() {
        let map = VerbMap::standard();
        assert!(map.get_verb_processor("helo").is_some());
        assert!(map.get_verb_processor("Mail").is_some());
        assert!(map.get_verb_processor("AUTH").is_none());
    }

    #[test]
    fn set_overwrites() {
        let mut map = VerbMap::new();
        map.set_verb_processor("noop", NoopVerb);
        map.set_verb_processor("NOOP", QuitVerb);
        assert_eq!(map.verbs.len(), 1);
    }
}
