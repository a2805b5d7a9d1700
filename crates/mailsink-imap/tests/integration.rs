//! Integration tests for the IMAP server.
//!
//! Each test scripts a whole client conversation into a mock stream, runs a
//! session bound to a [`SessionHandler`] over an in-memory repository, and
//! inspects what the server wrote back.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use mailsink_core::{
    DEFAULT_MAILBOX, MailboxRepository, MessagesRepository, NewMessage, ServerOptions,
    SqliteRepository, UserOptions,
};
use mailsink_imap::{SessionHandler, run_session};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;

const FIRST: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Quarterly report\r\n\
\r\n\
Numbers attached.\r\n";

const SECOND: &[u8] = b"From: carol@example.com\r\n\
To: dave@example.com\r\n\
Subject: Lunch\r\n\
\r\n\
Noon?\r\n";

/// Mock stream that plays a client script and captures server output.
struct MockStream {
    /// Client input, in order.
    script: Cursor<Vec<u8>>,
    /// Everything the server wrote.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(script: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            script: Cursor::new(script.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.script.position()).unwrap();
        let data = self.script.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.script.set_position((pos + to_read) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

async fn repository_with(messages: &[&[u8]]) -> SqliteRepository {
    let repository = SqliteRepository::in_memory().await.unwrap();
    for data in messages {
        repository
            .add_message(DEFAULT_MAILBOX, None, NewMessage::from_data(data.to_vec()))
            .await
            .unwrap();
    }
    repository
}

/// Runs `script` to completion and returns the server output.
async fn converse(options: ServerOptions, repository: SqliteRepository, script: &[u8]) -> String {
    let (stream, sent) = MockStream::new(script);
    let options = Arc::new(options);
    let channel = mailsink_core::LineChannel::new(
        stream,
        Duration::from_secs(5),
        CancellationToken::new(),
    );
    run_session(channel, SessionHandler::new(options, repository), "127.0.0.1:40003").await;
    let bytes = sent.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

mod login_tests {
    use super::*;

    fn strict() -> ServerOptions {
        ServerOptions {
            authentication_required: true,
            users: vec![UserOptions {
                username: "rob".to_string(),
                password: "secret".to_string(),
                default_mailbox: Some("Rob".to_string()),
            }],
            ..ServerOptions::default()
        }
    }

    #[tokio::test]
    async fn rejects_bad_password_then_accepts() {
        let repository = repository_with(&[]).await;
        let out = converse(
            strict(),
            repository,
            b"a1 LOGIN rob wrong\r\na2 SELECT INBOX\r\na3 LOGIN rob secret\r\na4 LOGOUT\r\n",
        )
        .await;

        assert!(out.starts_with("* OK smtp4dev IMAP4rev1 server ready\r\n"));
        assert!(out.contains("a1 NO Invalid username or password\r\n"));
        assert!(out.contains("a2 BAD Command not valid in this state\r\n"));
        assert!(out.contains("a3 OK LOGIN completed\r\n"));
        assert!(out.ends_with("a4 OK LOGOUT completed\r\n"));
    }

    #[tokio::test]
    async fn user_mailbox_is_used() {
        let repository = repository_with(&[FIRST]).await;
        repository
            .add_message("Rob", None, NewMessage::from_data(SECOND.to_vec()))
            .await
            .unwrap();

        let out = converse(
            strict(),
            repository,
            b"a1 LOGIN {3}\r\nrob {6+}\r\nsecret\r\na2 SELECT INBOX\r\na3 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("+ Ready for literal data\r\n"));
        assert!(out.contains("a1 OK LOGIN completed\r\n"));
        assert!(out.contains("* 1 EXISTS\r\n"));
    }
}

mod mailbox_tests {
    use super::*;

    #[tokio::test]
    async fn select_fetch_search() {
        let repository = repository_with(&[FIRST, SECOND]).await;
        let out = converse(
            ServerOptions::default(),
            repository.clone(),
            b"a1 LOGIN any thing\r\n\
              a2 SELECT INBOX\r\n\
              a3 SEARCH UNSEEN FROM alice\r\n\
              a4 UID SEARCH OR SUBJECT lunch FROM alice\r\n\
              a5 FETCH 2 (FLAGS BODY.PEEK[HEADER])\r\n\
              a6 FETCH 1 BODY[TEXT]\r\n\
              a7 SEARCH SEEN\r\n\
              a8 SEARCH LARGER 100\r\n\
              a9 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("* 2 EXISTS\r\n"));
        assert!(out.contains("a2 OK [READ-WRITE] SELECT completed\r\n"));
        assert!(out.contains("* SEARCH 1\r\na3 OK SEARCH completed\r\n"));
        assert!(out.contains("* SEARCH 1 2\r\na4 OK SEARCH completed\r\n"));
        assert!(out.contains("* 2 FETCH (FLAGS () BODY[HEADER] {65}\r\nFrom: carol@example.com\r\n"));
        assert!(out.contains("* 1 FETCH (BODY[TEXT] {19}\r\nNumbers attached.\r\n FLAGS (\\Seen))\r\n"));
        assert!(out.contains("* SEARCH 1\r\na7 OK SEARCH completed\r\n"));
        assert!(out.contains("a8 NO The criteria 'LARGER' is not supported\r\n"));

        let unread = repository
            .get_messages(DEFAULT_MAILBOX, None, true)
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
    }

    #[tokio::test]
    async fn store_deleted_then_noop_expunges() {
        let repository = repository_with(&[FIRST, SECOND]).await;
        let out = converse(
            ServerOptions::default(),
            repository.clone(),
            b"a1 LOGIN any thing\r\n\
              a2 SELECT INBOX\r\n\
              a3 STORE 1 +FLAGS (\\Deleted)\r\n\
              a4 NOOP\r\n\
              a5 FETCH 1:* UID\r\n\
              a6 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("* 1 FETCH (FLAGS (\\Deleted))\r\na3 OK STORE completed\r\n"));
        assert!(out.contains("* 1 EXPUNGE\r\n* 1 EXISTS\r\na4 OK NOOP completed\r\n"));
        assert!(out.contains("* 1 FETCH (UID 2)\r\n"));

        let left = repository
            .get_messages(DEFAULT_MAILBOX, None, false)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn examine_is_read_only() {
        let repository = repository_with(&[FIRST]).await;
        let out = converse(
            ServerOptions::default(),
            repository.clone(),
            b"a1 LOGIN any thing\r\n\
              a2 EXAMINE INBOX\r\n\
              a3 FETCH 1 RFC822\r\n\
              a4 STORE 1 +FLAGS (\\Seen)\r\n\
              a5 CLOSE\r\n\
              a6 FETCH 1 FLAGS\r\n\
              a7 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("a2 OK [READ-ONLY] EXAMINE completed\r\n"));
        assert!(out.contains("a4 NO Mailbox is read-only\r\n"));
        assert!(out.contains("a5 OK CLOSE completed\r\n"));
        assert!(out.contains("a6 BAD Command not valid in this state\r\n"));

        let unread = repository
            .get_messages(DEFAULT_MAILBOX, None, true)
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
    }
}

mod folder_tests {
    use super::*;

    #[tokio::test]
    async fn create_copy_append_list() {
        let repository = repository_with(&[FIRST]).await;
        let out = converse(
            ServerOptions::default(),
            repository.clone(),
            b"a1 LOGIN any thing\r\n\
              a2 CREATE Archive\r\n\
              a3 SELECT INBOX\r\n\
              a4 COPY 1 Archive\r\n\
              a5 APPEND Archive (\\Seen) {38+}\r\n\
              From: eve@example.com\r\nSubject: Hi\r\n\r\n\r\n\
              a6 LIST \"\" *\r\n\
              a7 LIST \"\" \"\"\r\n\
              a8 STATUS Archive (MESSAGES UNSEEN)\r\n\
              a9 NAMESPACE\r\n\
              b1 COPY 1 Nowhere\r\n\
              b2 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("a2 OK CREATE completed\r\n"));
        assert!(out.contains("a4 OK [COPYUID "));
        assert!(out.contains("a5 OK [APPENDUID "));
        assert!(out.contains("* LIST () \"/\" \"Archive\"\r\n* LIST () \"/\" \"INBOX\"\r\na6 OK LIST completed\r\n"));
        assert!(out.contains("* LIST (\\Noselect) \"/\" \"\"\r\na7 OK LIST completed\r\n"));
        assert!(out.contains("* STATUS \"Archive\" (MESSAGES 2 UNSEEN 1)\r\n"));
        assert!(out.contains("* NAMESPACE ((\"\" \"/\")) NIL NIL\r\n"));
        assert!(out.contains("b1 NO [TRYCREATE] Mailbox does not exist\r\n"));

        let archived = repository
            .get_messages(DEFAULT_MAILBOX, Some("Archive"), false)
            .await
            .unwrap();
        assert_eq!(archived.len(), 2);
        assert_eq!(archived[1].from, "eve@example.com");

        let folders = repository.get_all_folders(DEFAULT_MAILBOX).await.unwrap();
        assert_eq!(folders.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_commands_get_bad() {
        let repository = repository_with(&[]).await;
        let out = converse(
            ServerOptions::default(),
            repository,
            b"a1 LOGIN any thing\r\na2 FETCH\r\na3 SEARCH (FROM\r\na4 LOGOUT\r\n",
        )
        .await;

        assert!(out.contains("a2 BAD "));
        assert!(out.contains("a3 BAD "));
        assert!(out.ends_with("a4 OK LOGOUT completed\r\n"));
    }
}
