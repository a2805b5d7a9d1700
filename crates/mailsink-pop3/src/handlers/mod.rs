//! POP3 command handlers and the command dispatch map.
//!
//! Each handler receives the session context and the command argument (the
//! rest of the line after the verb, if any), writes its complete response
//! and returns whether the session continues. I/O inside a handler observes
//! the session's cancellation signal through the context's channel.

mod authorization;
mod maildrop;
mod session;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use authorization::{PassCommand, UserCommand};
pub use maildrop::{
    DeleCommand, ListCommand, NoopCommand, RetrCommand, RsetCommand, StatCommand, TopCommand,
    UidlCommand,
};
pub use session::{CapaCommand, QuitCommand, StlsCommand, UnknownCommand};

use mailsink_core::{MessagesRepository, StoredMessage};

use crate::context::Pop3SessionContext;
use crate::error::Result;

/// What the session loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Outcome {
    /// Read the next command.
    Continue,
    /// Stop reading and close the connection.
    Quit,
}

/// Boxed future returned by [`CommandHandler::execute`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Pop3Outcome>> + Send + 'a>>;

/// Handler for one POP3 command.
pub trait CommandHandler<R>: Send + Sync {
    /// Executes the command and flushes its response.
    ///
    /// An `Err` is reported to the client as `-ERR Internal server error`
    /// unless it is a transport failure, which ends the session.
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a>;
}

/// Key of the fallback handler for unregistered commands.
pub const UNKNOWN: &str = "UNKNOWN";

/// Case-insensitive command-name registry.
pub struct CommandMap<R> {
    handlers: HashMap<String, Arc<dyn CommandHandler<R>>>,
}

impl<R> Clone for CommandMap<R> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<R> Default for CommandMap<R> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<R> std::fmt::Debug for CommandMap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl<R> CommandMap<R> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the handler for `command`.
    pub fn set_handler(&mut self, command: &str, handler: impl CommandHandler<R> + 'static) {
        self.handlers
            .insert(command.to_ascii_uppercase(), Arc::new(handler));
    }

    /// Looks up the handler for `command`.
    #[must_use]
    pub fn get_handler(&self, command: &str) -> Option<Arc<dyn CommandHandler<R>>> {
        self.handlers.get(&command.to_ascii_uppercase()).cloned()
    }

    /// Looks up `command`, falling back to the [`UNKNOWN`] handler.
    #[must_use]
    pub fn resolve(&self, command: &str) -> Option<Arc<dyn CommandHandler<R>>> {
        self.get_handler(command)
            .or_else(|| self.get_handler(UNKNOWN))
    }
}

impl<R: MessagesRepository + 'static> CommandMap<R> {
    /// Returns every standard command.
    #[must_use]
    pub fn standard() -> Self {
        let mut map = Self::new();
        map.set_handler("USER", UserCommand);
        map.set_handler("PASS", PassCommand);
        map.set_handler("STAT", StatCommand);
        map.set_handler("LIST", ListCommand);
        map.set_handler("UIDL", UidlCommand);
        map.set_handler("RETR", RetrCommand);
        map.set_handler("TOP", TopCommand);
        map.set_handler("DELE", DeleCommand);
        map.set_handler("RSET", RsetCommand);
        map.set_handler("NOOP", NoopCommand);
        map.set_handler("QUIT", QuitCommand);
        map.set_handler("CAPA", CapaCommand);
        map.set_handler("STLS", StlsCommand);
        map.set_handler(UNKNOWN, UnknownCommand);
        map
    }
}

/// Writes `-ERR <reason>` and continues.
pub(crate) async fn reject<R: MessagesRepository>(
    context: &mut Pop3SessionContext<R>,
    reason: &str,
) -> Result<Pop3Outcome> {
    context.write_line(&format!("-ERR {reason}")).await?;
    Ok(Pop3Outcome::Continue)
}

/// Parses a 1-based message number argument and looks the message up.
///
/// Writes the `-ERR` response itself and returns `None` on failure.
pub(crate) async fn resolve_message<R: MessagesRepository>(
    context: &mut Pop3SessionContext<R>,
    argument: Option<&str>,
) -> Result<Option<StoredMessage>> {
    let Some(index) = argument
        .and_then(|a| a.split_whitespace().next())
        .and_then(|a| a.parse::<usize>().ok())
    else {
        reject(context, "Invalid message number").await?;
        return Ok(None);
    };

    match context.message_at(index).await? {
        Some(message) => Ok(Some(message)),
        None => {
            reject(context, "No such message").await?;
            Ok(None)
        }
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
    use mailsink_core::SqliteRepository;

    #[test]
    fn lookup_is_case_insensitive() {
        let map = CommandMap::<SqliteRepository>::standard();
        assert!(map.get_handler("retr").is_some());
        assert!(map.get_handler("Capa").is_some());
        assert!(map.get_handler("XTND").is_none());
        assert!(map.resolve("XTND").is_some());
    }

    #[test]
    fn resolve_without_fallback() {
        let map = CommandMap::<SqliteRepository>::new();
        assert!(map.resolve("USER").is_none());
    }
}
