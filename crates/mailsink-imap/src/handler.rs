//! Repository-backed session handler.
//!
//! [`SessionHandler`] answers every event a session raises with a few
//! repository calls. Each event is its own unit of work; nothing is held
//! open between events. The mailbox a session works in is resolved at
//! LOGIN: the user's configured default mailbox when authentication is
//! required, otherwise [`DEFAULT_MAILBOX`].

use std::sync::Arc;

use mailsink_core::model::INBOX;
use mailsink_core::{
    DEFAULT_MAILBOX, Folder, MailboxRepository, MessagesRepository, NewMessage, ServerOptions,
};
use regex::RegexBuilder;
use tracing::{debug, info, warn};

use crate::Result;
use crate::events::{
    AppendEvent, CopyEvent, FetchEvent, ImapEvents, ListEvent, LoginEvent, MailboxEvent,
    NamespaceEvent, PollEvent, SearchEvent, SelectEvent, StatusEvent, StoreEvent, SubscribeEvent,
};
use crate::fetch;
use crate::parser::{FetchAttribute, StatusItem};
use crate::search::translate;
use crate::selected::SelectedMailbox;
use crate::types::{Flag, Response, ResponseCode, flag_list, quoted};

/// Hierarchy separator for folder paths.
pub const SEPARATOR: char = '/';

/// Flags a client can change.
const PERMANENT_FLAGS: [Flag; 2] = [Flag::Seen, Flag::Deleted];

/// Maps a client mailbox name to a folder path. `INBOX` is case-insensitive.
#[must_use]
pub fn folder_path(name: &str) -> String {
    let name = name.trim_end_matches(SEPARATOR);
    if name.eq_ignore_ascii_case(INBOX) {
        INBOX.to_string()
    } else {
        name.to_string()
    }
}

/// Translates a LIST pattern into an anchored regular expression.
///
/// `*` matches across levels and `%` stays within one level.
#[must_use]
pub fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".+"),
            '%' => out.push_str("[^/]+"),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

/// Binds session events to a message and mailbox repository.
pub struct SessionHandler<R> {
    options: Arc<ServerOptions>,
    repository: R,
    mailbox: String,
}

impl<R> std::fmt::Debug for SessionHandler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler")
            .field("mailbox", &self.mailbox)
            .finish_non_exhaustive()
    }
}

impl<R: MessagesRepository + MailboxRepository> SessionHandler<R> {
    /// Creates a handler for one connection.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>, repository: R) -> Self {
        Self {
            options,
            repository,
            mailbox: DEFAULT_MAILBOX.to_string(),
        }
    }

    /// Mailbox the session reads and writes.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    async fn find_folder(&self, name: &str) -> Result<Option<Folder>> {
        let path = folder_path(name);
        let folders = self.repository.get_all_folders(&self.mailbox).await?;
        Ok(folders.into_iter().find(|f| f.path == path))
    }
}

fn uid_validity(folder: &Folder) -> u32 {
    u32::try_from(folder.id).unwrap_or(1).max(1)
}

impl<R: MessagesRepository + MailboxRepository> ImapEvents for SessionHandler<R> {
    async fn login(&mut self, event: &mut LoginEvent) -> Result<()> {
        if !self.options.authentication_required {
            self.mailbox = DEFAULT_MAILBOX.to_string();
            event.response = Response::ok("LOGIN completed");
            return Ok(());
        }

        if self
            .options
            .check_password(&event.username, &event.password)
        {
            self.mailbox = self.options.mailbox_for_user(Some(&event.username));
            info!(user = %event.username, mailbox = %self.mailbox, "IMAP login");
            event.response = Response::ok("LOGIN completed");
        } else {
            warn!(user = %event.username, "IMAP login failed");
            event.response = Response::no("Invalid username or password");
        }
        Ok(())
    }

    async fn select(&mut self, event: &mut SelectEvent) -> Result<()> {
        let Some(folder) = self.find_folder(&event.mailbox).await? else {
            event.response = Response::no("Mailbox does not exist");
            return Ok(());
        };

        let messages = self
            .repository
            .get_messages(&self.mailbox, Some(&folder.path), false)
            .await?;
        let selected = SelectedMailbox::new(
            event.mailbox.clone(),
            folder.path.clone(),
            uid_validity(&folder),
            event.read_only,
            &messages,
        );

        let response = &mut event.response;
        *response = Response::ok(if event.read_only {
            "EXAMINE completed"
        } else {
            "SELECT completed"
        })
        .with_code(if event.read_only {
            ResponseCode::ReadOnly
        } else {
            ResponseCode::ReadWrite
        });
        response.push_untagged(format!("FLAGS {}", flag_list(&PERMANENT_FLAGS)));
        response.push_untagged(format!("{} EXISTS", selected.exists()));
        response.push_untagged("0 RECENT");
        if let Some(seq) = selected.first_unseen() {
            response.push_untagged(format!("OK [{}] First unseen", ResponseCode::Unseen(seq)));
        }
        response.push_untagged(format!(
            "OK [{}] UIDs valid",
            ResponseCode::UidValidity(selected.uid_validity)
        ));
        response.push_untagged(format!(
            "OK [{}] Predicted next UID",
            ResponseCode::UidNext(selected.uid_next())
        ));
        response.push_untagged(format!(
            "OK [{}] Limited",
            ResponseCode::PermanentFlags(PERMANENT_FLAGS.to_vec())
        ));

        debug!(mailbox = %self.mailbox, folder = %folder.path, exists = selected.exists(), "Folder selected");
        event.selected = Some(selected);
        Ok(())
    }

    async fn fetch(&mut self, event: &mut FetchEvent<'_>) -> Result<()> {
        let marks_read = !event.selected.read_only && event.items.iter().any(|i| i.sets_seen());

        for (seq, index) in event.selected.resolve(&event.set, event.uid) {
            let info = &mut event.selected.messages[index];
            let Some(message) = self.repository.try_get_message_by_id(info.id).await? else {
                continue;
            };

            let mut items = event.items.clone();
            if marks_read && !info.is_seen() {
                self.repository.mark_message_read(info.id).await?;
                info.flags.push(Flag::Seen);
                if !items.contains(&FetchAttribute::Flags) {
                    items.push(FetchAttribute::Flags);
                }
            }

            event
                .response
                .push_untagged_bytes(fetch::render(seq, info, &message, &items, event.uid));
        }

        event.response = Response {
            untagged: std::mem::take(&mut event.response.untagged),
            ..Response::ok("FETCH completed")
        };
        Ok(())
    }

    async fn store(&mut self, event: &mut StoreEvent<'_>) -> Result<()> {
        if event.selected.read_only {
            event.response = Response::no("Mailbox is read-only");
            return Ok(());
        }

        let mut response = Response::ok("STORE completed");
        for (seq, index) in event.selected.resolve(&event.set, event.uid) {
            let info = &mut event.selected.messages[index];
            let was_seen = info.is_seen();
            event.mode.apply(&mut info.flags, &event.flags);

            if info.is_seen() && !was_seen {
                self.repository.mark_message_read(info.id).await?;
            }
            if info.flags.contains(&Flag::Deleted) {
                self.repository.delete_message(info.id).await?;
                debug!(id = info.id, "Message deleted by STORE");
            }

            if !event.silent {
                let uid = if event.uid {
                    format!(" UID {}", info.uid)
                } else {
                    String::new()
                };
                response.push_untagged(format!(
                    "{seq} FETCH (FLAGS {}{uid})",
                    flag_list(&info.flags)
                ));
            }
        }

        event.response = response;
        Ok(())
    }

    async fn search(&mut self, event: &mut SearchEvent<'_>) -> Result<()> {
        let filter = match translate(event.criteria) {
            Ok(filter) => filter,
            Err(e) => {
                debug!(error = %e, "Search refused");
                event.response = Response::no(e.to_string());
                return Ok(());
            }
        };

        let messages = self
            .repository
            .get_messages(&self.mailbox, Some(&event.selected.folder), false)
            .await?;
        let hits: Vec<String> = filter
            .select(&messages)
            .into_iter()
            .filter_map(|m| {
                let seq = event.selected.sequence_of_uid(m.imap_uid)?;
                Some(if event.uid { m.imap_uid } else { seq })
            })
            .map(|n| n.to_string())
            .collect();

        let mut response = Response::ok("SEARCH completed");
        if hits.is_empty() {
            response.push_untagged("SEARCH");
        } else {
            response.push_untagged(format!("SEARCH {}", hits.join(" ")));
        }
        event.response = response;
        Ok(())
    }

    async fn list(&mut self, event: &mut ListEvent) -> Result<()> {
        let command = if event.subscribed { "LSUB" } else { "LIST" };
        let mut response = Response::ok(format!("{command} completed"));

        if event.pattern.is_empty() {
            response.push_untagged(format!("{command} (\\Noselect) \"{SEPARATOR}\" \"\""));
            event.response = response;
            return Ok(());
        }

        let full_pattern = format!("{}{}", event.reference, event.pattern);
        let Ok(matcher) = RegexBuilder::new(&pattern_to_regex(&full_pattern))
            .case_insensitive(true)
            .build()
        else {
            event.response = Response::bad("Invalid mailbox pattern");
            return Ok(());
        };

        for folder in self.repository.get_all_folders(&self.mailbox).await? {
            if matcher.is_match(&folder.path) {
                response.push_untagged(format!(
                    "{command} () \"{SEPARATOR}\" {}",
                    quoted(&folder.path)
                ));
            }
        }
        event.response = response;
        Ok(())
    }

    async fn copy(&mut self, event: &mut CopyEvent<'_>) -> Result<()> {
        let Some(target) = self.find_folder(&event.mailbox).await? else {
            event.response = Response::no("Mailbox does not exist").with_code(ResponseCode::TryCreate);
            return Ok(());
        };

        let mut source_uids = Vec::new();
        let mut dest_uids = Vec::new();
        for (_, index) in event.selected.resolve(&event.set, event.uid) {
            let info = &event.selected.messages[index];
            let copy = self
                .repository
                .copy_message_to_folder(info.id, &target.path)
                .await?;
            source_uids.push(info.uid);
            dest_uids.push(copy.imap_uid);
        }

        event.response = if source_uids.is_empty() {
            Response::ok("COPY completed")
        } else {
            Response::ok("COPY completed").with_code(ResponseCode::CopyUid {
                uidvalidity: uid_validity(&target),
                source_uids,
                dest_uids,
            })
        };
        Ok(())
    }

    async fn append(&mut self, event: &mut AppendEvent) -> Result<()> {
        let Some(folder) = self.find_folder(&event.mailbox).await? else {
            event.response = Response::no("Mailbox does not exist").with_code(ResponseCode::TryCreate);
            return Ok(());
        };

        let message = NewMessage::from_data(std::mem::take(&mut event.data));
        let stored = self
            .repository
            .add_message(&self.mailbox, Some(&folder.path), message)
            .await?;
        if event.flags.contains(&Flag::Seen) {
            self.repository.mark_message_read(stored.id).await?;
        }

        info!(id = stored.id, folder = %folder.path, from = %stored.from, "Message appended");
        event.response = Response::ok("APPEND completed").with_code(ResponseCode::AppendUid {
            uidvalidity: uid_validity(&folder),
            uid: stored.imap_uid,
        });
        Ok(())
    }

    async fn create(&mut self, event: &mut MailboxEvent) -> Result<()> {
        let path = folder_path(&event.mailbox);
        if path.is_empty() || path == INBOX {
            event.response = Response::no("Cannot create that mailbox");
            return Ok(());
        }
        if self.find_folder(&path).await?.is_some() {
            event.response = Response::no("Mailbox already exists");
            return Ok(());
        }

        self.repository.create_folder(&self.mailbox, &path).await?;
        event.response = Response::ok("CREATE completed");
        Ok(())
    }

    async fn delete(&mut self, event: &mut MailboxEvent) -> Result<()> {
        let path = folder_path(&event.mailbox);
        if path == INBOX {
            event.response = Response::no("Cannot delete INBOX");
            return Ok(());
        }

        event.response = match self.repository.delete_folder(&self.mailbox, &path).await {
            Ok(()) => Response::ok("DELETE completed"),
            Err(mailsink_core::Error::FolderNotFound(_)) => Response::no("Mailbox does not exist"),
            Err(e) => return Err(e.into()),
        };
        Ok(())
    }

    async fn subscribe(&mut self, event: &mut SubscribeEvent) -> Result<()> {
        event.response = Response::ok(if event.subscribe {
            "SUBSCRIBE completed"
        } else {
            "UNSUBSCRIBE completed"
        });
        Ok(())
    }

    async fn status(&mut self, event: &mut StatusEvent) -> Result<()> {
        let Some(folder) = self.find_folder(&event.mailbox).await? else {
            event.response = Response::no("Mailbox does not exist");
            return Ok(());
        };

        let messages = self
            .repository
            .get_messages(&self.mailbox, Some(&folder.path), false)
            .await?;
        let unseen = messages.iter().filter(|m| m.is_unread).count();
        let uid_next = messages.iter().map(|m| m.imap_uid).max().unwrap_or(0).saturating_add(1);

        let values: Vec<String> = event
            .items
            .iter()
            .map(|item| {
                let value = match item {
                    StatusItem::Messages => messages.len().to_string(),
                    StatusItem::Recent => "0".to_string(),
                    StatusItem::UidNext => uid_next.to_string(),
                    StatusItem::UidValidity => uid_validity(&folder).to_string(),
                    StatusItem::Unseen => unseen.to_string(),
                };
                format!("{} {value}", item.as_str())
            })
            .collect();

        let mut response = Response::ok("STATUS completed");
        response.push_untagged(format!(
            "STATUS {} ({})",
            quoted(&event.mailbox),
            values.join(" ")
        ));
        event.response = response;
        Ok(())
    }

    async fn namespace(&mut self, event: &mut NamespaceEvent) -> Result<()> {
        let mut response = Response::ok("NAMESPACE completed");
        response.push_untagged(format!("NAMESPACE ((\"\" \"{SEPARATOR}\")) NIL NIL"));
        event.response = response;
        Ok(())
    }

    async fn poll(&mut self, event: &mut PollEvent<'_>) -> Result<()> {
        let messages = self
            .repository
            .get_messages(&self.mailbox, Some(&event.selected.folder), false)
            .await?;
        for update in event.selected.sync(&messages) {
            event.response.push_untagged(update);
        }
        Ok(())
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
    use mailsink_core::{SqliteRepository, UserOptions};

    const FIRST: &[u8] = b"From: alice@example.com\r\nTo: bob@example.com\r\nSubject: First\r\n\r\nHello\r\n";
    const SECOND: &[u8] = b"From: carol@example.com\r\nTo: bob@example.com\r\nSubject: Second\r\n\r\nBye\r\n";

    async fn handler_with(messages: &[&[u8]]) -> SessionHandler<SqliteRepository> {
        let repository = SqliteRepository::in_memory().await.unwrap();
        for data in messages {
            repository
                .add_message(DEFAULT_MAILBOX, None, NewMessage::from_data(data.to_vec()))
                .await
                .unwrap();
        }
        SessionHandler::new(Arc::new(ServerOptions::default()), repository)
    }

    async fn select_inbox(handler: &mut SessionHandler<SqliteRepository>) -> SelectedMailbox {
        let mut event = SelectEvent {
            mailbox: "inbox".to_string(),
            read_only: false,
            selected: None,
            response: Response::ok(""),
        };
        handler.select(&mut event).await.unwrap();
        event.selected.unwrap()
    }

    mod pattern_tests {
        use super::*;

        #[test]
        fn wildcards() {
            assert_eq!(pattern_to_regex("*"), "^.+$");
            assert_eq!(pattern_to_regex("%"), "^[^/]+$");
            assert_eq!(pattern_to_regex("a.b/%"), "^a\\.b/[^/]+$");
        }

        #[test]
        fn inbox_is_case_insensitive() {
            assert_eq!(folder_path("inbox"), "INBOX");
            assert_eq!(folder_path("Archive/"), "Archive");
        }
    }

    mod login_tests {
        use super::*;

        fn login(username: &str, password: &str) -> LoginEvent {
            LoginEvent {
                username: username.to_string(),
                password: password.to_string(),
                response: Response::ok(""),
            }
        }

        #[tokio::test]
        async fn anything_goes_without_auth() {
            let mut handler = handler_with(&[]).await;
            let mut event = login("anyone", "whatever");
            handler.login(&mut event).await.unwrap();
            assert_eq!(event.response.status, Status::Ok);
            assert_eq!(handler.mailbox(), DEFAULT_MAILBOX);
        }

        #[tokio::test]
        async fn configured_user_gets_their_mailbox() {
            let options = ServerOptions {
                authentication_required: true,
                users: vec![UserOptions {
                    username: "rob".to_string(),
                    password: "secret".to_string(),
                    default_mailbox: Some("Rob".to_string()),
                }],
                ..ServerOptions::default()
            };
            let repository = SqliteRepository::in_memory().await.unwrap();
            let mut handler = SessionHandler::new(Arc::new(options), repository);

            let mut bad = login("rob", "nope");
            handler.login(&mut bad).await.unwrap();
            assert_eq!(bad.response.status, Status::No);

            let mut good = login("ROB", "secret");
            handler.login(&mut good).await.unwrap();
            assert_eq!(good.response.status, Status::Ok);
            assert_eq!(handler.mailbox(), "Rob");
        }
    }

    #[tokio::test]
    async fn select_reports_counts() {
        let mut handler = handler_with(&[FIRST, SECOND]).await;
        let mut event = SelectEvent {
            mailbox: "INBOX".to_string(),
            read_only: true,
            selected: None,
            response: Response::ok(""),
        };
        handler.select(&mut event).await.unwrap();

        assert_eq!(event.response.code, Some(ResponseCode::ReadOnly));
        assert!(event.response.untagged.iter().any(|l| l.as_ref() == b"* 2 EXISTS"));
        assert!(
            event
                .response
                .untagged
                .iter()
                .any(|l| l.as_ref() == b"* OK [UNSEEN 1] First unseen")
        );
        assert_eq!(event.selected.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn select_missing_folder() {
        let mut handler = handler_with(&[]).await;
        let mut event = SelectEvent {
            mailbox: "Nowhere".to_string(),
            read_only: false,
            selected: None,
            response: Response::ok(""),
        };
        handler.select(&mut event).await.unwrap();
        assert_eq!(event.response.status, Status::No);
        assert!(event.selected.is_none());
    }

    mod message_tests {
        use super::*;
        use crate::types::{SequenceSet, StoreMode};

        #[tokio::test]
        async fn fetch_body_marks_read() {
            let mut handler = handler_with(&[FIRST]).await;
            let mut selected = select_inbox(&mut handler).await;

            let mut event = FetchEvent {
                selected: &mut selected,
                set: SequenceSet::parse("1").unwrap(),
                uid: false,
                items: vec![FetchAttribute::Body {
                    section: crate::parser::Section::Text,
                    peek: false,
                }],
                response: Response::ok(""),
            };
            handler.fetch(&mut event).await.unwrap();

            assert_eq!(event.response.text, "FETCH completed");
            assert_eq!(
                event.response.untagged[0].as_ref(),
                b"* 1 FETCH (BODY[TEXT] {7}\r\nHello\r\n FLAGS (\\Seen))"
            );
            assert!(selected.messages[0].is_seen());

            let unread = handler
                .repository
                .get_messages(DEFAULT_MAILBOX, None, true)
                .await
                .unwrap();
            assert!(unread.is_empty());
        }

        #[tokio::test]
        async fn store_deleted_removes_message() {
            let mut handler = handler_with(&[FIRST, SECOND]).await;
            let mut selected = select_inbox(&mut handler).await;

            let mut event = StoreEvent {
                selected: &mut selected,
                set: SequenceSet::parse("2").unwrap(),
                uid: false,
                mode: StoreMode::Add,
                silent: false,
                flags: vec![Flag::Deleted],
                response: Response::ok(""),
            };
            handler.store(&mut event).await.unwrap();
            assert_eq!(
                event.response.untagged[0].as_ref(),
                b"* 2 FETCH (FLAGS (\\Deleted))"
            );

            let mut poll = PollEvent {
                selected: &mut selected,
                response: Response::ok("NOOP completed"),
            };
            handler.poll(&mut poll).await.unwrap();
            assert_eq!(
                poll.response.untagged,
                vec![
                    bytes::Bytes::from_static(b"* 2 EXPUNGE"),
                    bytes::Bytes::from_static(b"* 1 EXISTS")
                ]
            );
        }

        #[tokio::test]
        async fn search_and_unsupported_key() {
            let mut handler = handler_with(&[FIRST, SECOND]).await;
            let selected = select_inbox(&mut handler).await;

            let criteria = crate::search::SearchKey::From("CAROL".to_string());
            let mut event = SearchEvent {
                selected: &selected,
                criteria: &criteria,
                uid: false,
                response: Response::ok(""),
            };
            handler.search(&mut event).await.unwrap();
            assert_eq!(event.response.untagged[0].as_ref(), b"* SEARCH 2");

            let criteria = crate::search::SearchKey::Larger(10);
            let mut event = SearchEvent {
                selected: &selected,
                criteria: &criteria,
                uid: false,
                response: Response::ok(""),
            };
            handler.search(&mut event).await.unwrap();
            assert_eq!(event.response.status, Status::No);
        }
    }

    mod folder_tests {
        use super::*;

        fn mailbox_event(name: &str) -> MailboxEvent {
            MailboxEvent {
                mailbox: name.to_string(),
                response: Response::ok(""),
            }
        }

        #[tokio::test]
        async fn create_list_delete() {
            let mut handler = handler_with(&[]).await;

            let mut create = mailbox_event("Archive/2024");
            handler.create(&mut create).await.unwrap();
            assert_eq!(create.response.status, Status::Ok);

            let mut again = mailbox_event("Archive/2024");
            handler.create(&mut again).await.unwrap();
            assert_eq!(again.response.status, Status::No);

            let mut list = ListEvent {
                reference: String::new(),
                pattern: "*".to_string(),
                subscribed: false,
                response: Response::ok(""),
            };
            handler.list(&mut list).await.unwrap();
            assert_eq!(
                list.response.untagged,
                vec![
                    bytes::Bytes::from_static(b"* LIST () \"/\" \"Archive/2024\""),
                    bytes::Bytes::from_static(b"* LIST () \"/\" \"INBOX\""),
                ]
            );

            let mut top_level = ListEvent {
                reference: String::new(),
                pattern: "%".to_string(),
                subscribed: true,
                response: Response::ok(""),
            };
            handler.list(&mut top_level).await.unwrap();
            assert_eq!(
                top_level.response.untagged,
                vec![bytes::Bytes::from_static(b"* LSUB () \"/\" \"INBOX\"")]
            );

            let mut delete = mailbox_event("Archive/2024");
            handler.delete(&mut delete).await.unwrap();
            assert_eq!(delete.response.status, Status::Ok);

            let mut missing = mailbox_event("Archive/2024");
            handler.delete(&mut missing).await.unwrap();
            assert_eq!(missing.response.status, Status::No);

            let mut inbox = mailbox_event("INBOX");
            handler.delete(&mut inbox).await.unwrap();
            assert_eq!(inbox.response.status, Status::No);
        }

        #[tokio::test]
        async fn append_derives_envelope_from_content() {
            let mut handler = handler_with(&[]).await;
            let mut event = AppendEvent {
                mailbox: "INBOX".to_string(),
                flags: vec![Flag::Seen],
                data: FIRST.to_vec(),
                response: Response::ok(""),
            };
            handler.append(&mut event).await.unwrap();
            assert!(matches!(
                event.response.code,
                Some(ResponseCode::AppendUid { .. })
            ));

            let stored = handler
                .repository
                .get_messages(DEFAULT_MAILBOX, None, false)
                .await
                .unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].from, "alice@example.com");
            assert_eq!(stored[0].to, vec!["bob@example.com"]);
            assert!(!stored[0].is_unread);
        }

        #[tokio::test]
        async fn copy_to_missing_folder_suggests_create() {
            let mut handler = handler_with(&[FIRST]).await;
            let selected = select_inbox(&mut handler).await;
            let mut event = CopyEvent {
                selected: &selected,
                set: crate::types::SequenceSet::parse("1").unwrap(),
                uid: false,
                mailbox: "Archive".to_string(),
                response: Response::ok(""),
            };
            handler.copy(&mut event).await.unwrap();
            assert_eq!(event.response.code, Some(ResponseCode::TryCreate));
        }
    }
}
