//! Session events raised by the command loop.
//!
//! The loop parses each command, checks the session state and then raises
//! one event on an [`ImapEvents`] implementation. The implementation fills
//! in the event's [`Response`]; the loop writes it. Every method has a
//! default that refuses the command with `NO`, so an implementation only
//! overrides the events it supports.
//!
//! # Example
//!
//! ```
//! use mailsink_imap::events::{ImapEvents, LoginEvent};
//! use mailsink_imap::types::Response;
//!
//! struct AllowEveryone;
//!
//! impl ImapEvents for AllowEveryone {
//!     async fn login(&mut self, event: &mut LoginEvent) -> mailsink_imap::Result<()> {
//!         event.response = Response::ok("LOGIN completed");
//!         Ok(())
//!     }
//! }
//! ```

use std::future::{Future, ready};

use crate::Result;
use crate::parser::{FetchAttribute, StatusItem};
use crate::search::SearchKey;
use crate::selected::SelectedMailbox;
use crate::types::{Flag, Response, SequenceSet, StoreMode};

fn not_supported(name: &str) -> Response {
    Response::no(format!("{name} not supported"))
}

/// LOGIN.
#[derive(Debug, Clone)]
pub struct LoginEvent {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Completion; `OK` authenticates the session.
    pub response: Response,
}

/// SELECT or EXAMINE.
#[derive(Debug, Clone)]
pub struct SelectEvent {
    /// Mailbox name.
    pub mailbox: String,
    /// EXAMINE.
    pub read_only: bool,
    /// Snapshot to select; set together with an `OK` response.
    pub selected: Option<SelectedMailbox>,
    /// Completion.
    pub response: Response,
}

/// FETCH or UID FETCH.
#[derive(Debug)]
pub struct FetchEvent<'a> {
    /// Selected mailbox; flags changed by the fetch are updated here.
    pub selected: &'a mut SelectedMailbox,
    /// Requested messages.
    pub set: SequenceSet,
    /// `set` holds UIDs.
    pub uid: bool,
    /// Requested items.
    pub items: Vec<FetchAttribute>,
    /// Untagged FETCH responses and completion.
    pub response: Response,
}

/// STORE or UID STORE.
#[derive(Debug)]
pub struct StoreEvent<'a> {
    /// Selected mailbox.
    pub selected: &'a mut SelectedMailbox,
    /// Target messages.
    pub set: SequenceSet,
    /// `set` holds UIDs.
    pub uid: bool,
    /// How flags are combined.
    pub mode: StoreMode,
    /// Suppress the untagged FETCH responses.
    pub silent: bool,
    /// Flags given.
    pub flags: Vec<Flag>,
    /// Completion.
    pub response: Response,
}

/// SEARCH or UID SEARCH.
#[derive(Debug)]
pub struct SearchEvent<'a> {
    /// Selected mailbox.
    pub selected: &'a SelectedMailbox,
    /// Criteria tree.
    pub criteria: &'a SearchKey,
    /// Return UIDs instead of sequence numbers.
    pub uid: bool,
    /// Untagged SEARCH response and completion.
    pub response: Response,
}

/// LIST or LSUB.
#[derive(Debug, Clone)]
pub struct ListEvent {
    /// Reference name.
    pub reference: String,
    /// Pattern with `*` and `%` wildcards.
    pub pattern: String,
    /// LSUB.
    pub subscribed: bool,
    /// Completion.
    pub response: Response,
}

/// COPY or UID COPY.
#[derive(Debug)]
pub struct CopyEvent<'a> {
    /// Selected mailbox.
    pub selected: &'a SelectedMailbox,
    /// Source messages.
    pub set: SequenceSet,
    /// `set` holds UIDs.
    pub uid: bool,
    /// Destination mailbox.
    pub mailbox: String,
    /// Completion.
    pub response: Response,
}

/// APPEND.
#[derive(Debug, Clone)]
pub struct AppendEvent {
    /// Destination mailbox.
    pub mailbox: String,
    /// Initial flags.
    pub flags: Vec<Flag>,
    /// The message, fully buffered.
    pub data: Vec<u8>,
    /// Completion.
    pub response: Response,
}

/// CREATE or DELETE.
#[derive(Debug, Clone)]
pub struct MailboxEvent {
    /// Mailbox name.
    pub mailbox: String,
    /// Completion.
    pub response: Response,
}

/// SUBSCRIBE or UNSUBSCRIBE.
#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    /// Mailbox name.
    pub mailbox: String,
    /// False for UNSUBSCRIBE.
    pub subscribe: bool,
    /// Completion.
    pub response: Response,
}

/// STATUS.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// Mailbox name.
    pub mailbox: String,
    /// Requested items.
    pub items: Vec<StatusItem>,
    /// Completion.
    pub response: Response,
}

/// NAMESPACE.
#[derive(Debug, Clone)]
pub struct NamespaceEvent {
    /// Completion.
    pub response: Response,
}

/// NOOP, CHECK or EXPUNGE with a mailbox selected.
#[derive(Debug)]
pub struct PollEvent<'a> {
    /// Snapshot to reconcile.
    pub selected: &'a mut SelectedMailbox,
    /// Untagged updates and completion.
    pub response: Response,
}

/// Handlers for the events a session raises.
///
/// Each call is independent: an implementation keeps nothing but
/// per-connection state between events. An `Err` is reported to the client
/// as `NO` unless it is a transport failure, which ends the session.
pub trait ImapEvents: Send {
    /// LOGIN.
    fn login(&mut self, event: &mut LoginEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("LOGIN");
        ready(Ok(()))
    }

    /// SELECT and EXAMINE.
    fn select(&mut self, event: &mut SelectEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("SELECT");
        ready(Ok(()))
    }

    /// FETCH.
    fn fetch(&mut self, event: &mut FetchEvent<'_>) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("FETCH");
        ready(Ok(()))
    }

    /// STORE.
    fn store(&mut self, event: &mut StoreEvent<'_>) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("STORE");
        ready(Ok(()))
    }

    /// SEARCH.
    fn search(&mut self, event: &mut SearchEvent<'_>) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("SEARCH");
        ready(Ok(()))
    }

    /// LIST and LSUB.
    fn list(&mut self, event: &mut ListEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("LIST");
        ready(Ok(()))
    }

    /// COPY.
    fn copy(&mut self, event: &mut CopyEvent<'_>) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("COPY");
        ready(Ok(()))
    }

    /// APPEND.
    fn append(&mut self, event: &mut AppendEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("APPEND");
        ready(Ok(()))
    }

    /// CREATE.
    fn create(&mut self, event: &mut MailboxEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("CREATE");
        ready(Ok(()))
    }

    /// DELETE.
    fn delete(&mut self, event: &mut MailboxEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("DELETE");
        ready(Ok(()))
    }

    /// SUBSCRIBE and UNSUBSCRIBE.
    fn subscribe(&mut self, event: &mut SubscribeEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("SUBSCRIBE");
        ready(Ok(()))
    }

    /// STATUS.
    fn status(&mut self, event: &mut StatusEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("STATUS");
        ready(Ok(()))
    }

    /// NAMESPACE.
    fn namespace(&mut self, event: &mut NamespaceEvent) -> impl Future<Output = Result<()>> + Send {
        event.response = not_supported("NAMESPACE");
        ready(Ok(()))
    }

    /// Reconciles the selected mailbox with the store.
    fn poll(&mut self, event: &mut PollEvent<'_>) -> impl Future<Output = Result<()>> + Send {
        let _ = event;
        ready(Ok(()))
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
    use crate::types::Status;

    struct Nothing;

    impl ImapEvents for Nothing {}

    #[tokio::test]
    async fn test_defaults_refuse() {
        let mut handler = Nothing;
        let mut login = LoginEvent {
            username: "rob".to_string(),
            password: "secret".to_string(),
            response: Response::ok(""),
        };
        handler.login(&mut login).await.unwrap();
        assert_eq!(login.response.status, Status::No);
        assert_eq!(login.response.text, "LOGIN not supported");

        let mut namespace = NamespaceEvent {
            response: Response::ok(""),
        };
        handler.namespace(&mut namespace).await.unwrap();
        assert_eq!(namespace.response.status, Status::No);
    }

    #[tokio::test]
    async fn test_default_poll_is_silent() {
        let mut handler = Nothing;
        let mut selected = SelectedMailbox::new("INBOX", "INBOX", 1, false, &[]);
        let mut poll = PollEvent {
            selected: &mut selected,
            response: Response::ok("NOOP completed"),
        };
        handler.poll(&mut poll).await.unwrap();
        assert_eq!(poll.response, Response::ok("NOOP completed"));
    }
}
