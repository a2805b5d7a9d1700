//! POP3 sessions against an in-memory repository.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use mailsink_core::{
    DEFAULT_MAILBOX, MAX_LINE_LENGTH, MessagesRepository, NewMessage, ServerOptions,
    SqliteRepository, TlsMode, UserOptions,
};
use mailsink_pop3::{CommandMap, Pop3SessionContext, run_session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    session: JoinHandle<()>,
}

impl TestClient {
    fn start(options: ServerOptions, repository: SqliteRepository) -> Self {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let context = Pop3SessionContext::new(
            server,
            Arc::new(options),
            repository,
            None,
            "127.0.0.1:40001",
            CancellationToken::new(),
        );
        let session = tokio::spawn(async move {
            let commands = CommandMap::standard();
            run_session(context, &commands).await;
        });

        let (read, writer) = tokio::io::split(client);
        Self {
            reader: BufReader::new(read),
            writer,
            session,
        }
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    async fn command(&mut self, line: &str) -> String {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
        self.line().await
    }

    /// Reads raw bytes up to and including the terminating `.` line.
    async fn multiline(&mut self) -> Vec<u8> {
        let mut block = Vec::new();
        loop {
            let mut line = Vec::new();
            self.reader.read_until(b'\n', &mut line).await.unwrap();
            let done = line == b".\r\n";
            block.extend_from_slice(&line);
            if done {
                return block;
            }
        }
    }

    async fn login(&mut self) {
        assert!(self.line().await.starts_with("+OK"));
        assert!(self.command("USER rob").await.starts_with("+OK"));
        assert!(self.command("PASS secret").await.starts_with("+OK"));
    }

    async fn quit(mut self) {
        assert_eq!(self.command("QUIT").await, "+OK Bye");
        self.session.await.unwrap();
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

const FIRST: &[u8] = b"Subject: one\r\n\r\nfirst\r\n.\r\nend\r\n";
const SECOND: &[u8] = b"Subject: two\r\n\r\nline 1\r\nline 2\r\nline 3\r\n";

mod authorization_tests {
    use super::*;

    #[tokio::test]
    async fn maildrop_requires_pass() {
        let repository = repository_with(&[FIRST]).await;
        let mut client = TestClient::start(ServerOptions::default(), repository);
        assert_eq!(client.line().await, "+OK smtp4dev POP3 server ready");

        assert!(client.command("STAT").await.starts_with("-ERR"));
        assert!(client.command("PASS secret").await.starts_with("-ERR"));
        assert!(client.command("USER").await.starts_with("-ERR"));
        assert!(client.command("USER anyone").await.starts_with("+OK"));
        assert!(client.command("PASS").await.starts_with("-ERR"));
        assert!(client.command("PASS whatever").await.starts_with("+OK"));
        assert!(client.command("STAT").await.starts_with("+OK 1 "));
        client.quit().await;
    }

    #[tokio::test]
    async fn configured_users_are_checked_when_required() {
        let options = ServerOptions {
            authentication_required: true,
            users: vec![UserOptions {
                username: "rob".to_string(),
                password: "secret".to_string(),
                default_mailbox: None,
            }],
            ..ServerOptions::default()
        };
        let repository = repository_with(&[]).await;
        let mut client = TestClient::start(options, repository);
        client.line().await;

        client.command("USER rob").await;
        assert!(client.command("PASS wrong").await.starts_with("-ERR"));
        assert!(client.command("PASS secret").await.starts_with("+OK"));
        assert!(client.command("PASS secret").await.starts_with("-ERR"));
        assert_eq!(client.command("STAT").await, "+OK 0 0");
        client.quit().await;
    }
}

mod maildrop_tests {
    use super::*;

    #[tokio::test]
    async fn indices_follow_repository_order() {
        let repository = repository_with(&[FIRST, SECOND]).await;
        let mut client = TestClient::start(ServerOptions::default(), repository);
        client.login().await;

        let total = FIRST.len() + SECOND.len();
        assert_eq!(client.command("STAT").await, format!("+OK 2 {total}"));

        assert_eq!(client.command("LIST").await, "+OK 2 messages");
        let listing = String::from_utf8(client.multiline().await).unwrap();
        assert_eq!(
            listing,
            format!("1 {}\r\n2 {}\r\n.\r\n", FIRST.len(), SECOND.len())
        );
        assert_eq!(client.command("LIST 2").await, format!("+OK 2 {}", SECOND.len()));
        assert!(client.command("LIST 3").await.starts_with("-ERR"));
        assert!(client.command("LIST x").await.starts_with("-ERR"));

        assert_eq!(client.command("UIDL").await, "+OK 2 messages");
        let uids = String::from_utf8(client.multiline().await).unwrap();
        let uids: Vec<&str> = uids.lines().collect();
        assert_eq!(uids.len(), 3);
        assert_ne!(uids[0].split(' ').nth(1), uids[1].split(' ').nth(1));
        client.quit().await;
    }

    #[tokio::test]
    async fn retr_is_dot_stuffed() {
        let repository = repository_with(&[FIRST]).await;
        let mut client = TestClient::start(ServerOptions::default(), repository);
        client.login().await;

        assert_eq!(client.command("RETR 1").await, format!("+OK {} octets", FIRST.len()));
        assert_eq!(
            client.multiline().await,
            b"Subject: one\r\n\r\nfirst\r\n..\r\nend\r\n.\r\n"
        );
        assert!(client.command("RETR 9").await.starts_with("-ERR"));
        client.quit().await;
    }

    #[tokio::test]
    async fn top_returns_headers_and_lines() {
        let repository = repository_with(&[SECOND]).await;
        let mut client = TestClient::start(ServerOptions::default(), repository);
        client.login().await;

        assert!(client.command("TOP 1 2").await.starts_with("+OK"));
        assert_eq!(
            client.multiline().await,
            b"Subject: two\r\n\r\nline 1\r\nline 2\r\n.\r\n"
        );
        assert!(client.command("TOP 1").await.starts_with("-ERR"));
        client.quit().await;
    }

    #[tokio::test]
    async fn dele_removes_from_repository() {
        let repository = repository_with(&[FIRST, SECOND]).await;
        let mut client = TestClient::start(ServerOptions::default(), repository.clone());
        client.login().await;

        assert!(client.command("DELE 1").await.starts_with("+OK"));
        assert!(client.command("RSET").await.starts_with("+OK"));
        assert!(client.command("NOOP").await.starts_with("+OK"));
        client.quit().await;

        let remaining = repository
            .get_messages(DEFAULT_MAILBOX, None, false)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].data, SECOND);
    }
}

mod capability_tests {
    use super::*;

    async fn capabilities(mode: TlsMode) -> Vec<String> {
        let options = ServerOptions {
            pop3_tls_mode: Some(mode),
            ..ServerOptions::default()
        };
        let mut client = TestClient::start(options, repository_with(&[]).await);
        client.line().await;
        assert!(client.command("CAPA").await.starts_with("+OK"));
        let block = String::from_utf8(client.multiline().await).unwrap();
        let lines = block.lines().map(str::to_string).collect();
        client.quit().await;
        lines
    }

    #[tokio::test]
    async fn stls_only_for_starttls_mode() {
        assert_eq!(capabilities(TlsMode::None).await, ["USER", "TOP", "UIDL", "."]);
        assert_eq!(
            capabilities(TlsMode::StartTls).await,
            ["USER", "TOP", "UIDL", "STLS", "."]
        );
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let mut client = TestClient::start(ServerOptions::default(), repository_with(&[FIRST]).await);
        client.login().await;

        let flood = format!("USER {}", "x".repeat(MAX_LINE_LENGTH));
        assert_eq!(client.command(&flood).await, "-ERR Line too long");
        assert!(client.command("STAT").await.starts_with("+OK 1 "));
        client.quit().await;
    }

    #[tokio::test]
    async fn stls_rejected_when_disabled() {
        let mut client = TestClient::start(ServerOptions::default(), repository_with(&[]).await);
        client.line().await;
        assert_eq!(client.command("STLS").await, "-ERR STLS not supported");
        assert_eq!(client.command("XTND").await, "-ERR Unknown command");
        client.quit().await;
    }

    #[tokio::test]
    async fn stls_without_certificate() {
        let options = ServerOptions {
            pop3_tls_mode: Some(TlsMode::StartTls),
            ..ServerOptions::default()
        };
        let mut client = TestClient::start(options, repository_with(&[]).await);
        client.line().await;
        assert_eq!(client.command("STLS").await, "-ERR TLS not available");
        client.quit().await;
    }
}
