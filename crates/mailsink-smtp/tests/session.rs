//! End-to-end SMTP sessions over in-memory duplex streams.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;

use mailsink_core::{MAX_LINE_LENGTH, ServerOptions, TlsMode, UserOptions};
use mailsink_smtp::{Connection, Message, OptionsServerBehaviour, Session, SessionErrorKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Client side of a running session.
struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    session: JoinHandle<Session>,
    messages: UnboundedReceiver<Message>,
}

impl TestClient {
    fn start(options: ServerOptions) -> Self {
        let (server, client) = tokio::io::duplex(64 * 1024);
        let (behaviour, messages) = OptionsServerBehaviour::new(Arc::new(options), None);
        let connection = Connection::new(
            server,
            Arc::new(behaviour),
            "127.0.0.1:40000",
            CancellationToken::new(),
        );
        let session = tokio::spawn(connection.process());

        let (read, writer) = tokio::io::split(client);
        Self {
            reader: BufReader::new(read),
            writer,
            session,
            messages,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Reads a complete (possibly multi-line) reply.
    async fn reply(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                return lines;
            }
        }
    }

    async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.reply().await.pop().unwrap()
    }

    async fn finish(mut self) -> (Session, Vec<Message>) {
        let _ = self.writer.shutdown().await;
        let session = self.session.await.unwrap();
        let mut messages = Vec::new();
        while let Ok(message) = self.messages.try_recv() {
            messages.push(message);
        }
        (session, messages)
    }
}

fn strict_options() -> ServerOptions {
    ServerOptions {
        authentication_required: true,
        smtp_allow_any_credentials: false,
        users: vec![UserOptions {
            username: "rob".to_string(),
            password: "secret".to_string(),
            default_mailbox: None,
        }],
        ..ServerOptions::default()
    }
}

mod transaction_tests {
    use super::*;

    #[tokio::test]
    async fn dot_stuffed_line_survives_transfer() {
        let mut client = TestClient::start(ServerOptions::default());
        assert_eq!(client.line().await, "220 localhost smtp4dev ready");

        let ehlo = {
            client.send("EHLO client.test").await;
            client.reply().await
        };
        assert_eq!(ehlo[0], "250-localhost Nice to meet you.");
        assert!(ehlo.contains(&"250-8BITMIME".to_string()));
        assert!(ehlo.contains(&"250-AUTH=CRAM-MD5 PLAIN LOGIN".to_string()));
        assert!(ehlo.contains(&"250-AUTH CRAM-MD5 PLAIN LOGIN ANONYMOUS XOAUTH2".to_string()));
        assert!(!ehlo.iter().any(|l| l.contains("STARTTLS")));

        assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("250"));
        assert!(client.command("RCPT TO:<c@d.com>").await.starts_with("250"));
        assert!(client.command("DATA").await.starts_with("354"));
        client.send("Subject: hi").await;
        client.send("").await;
        client.send("..").await;
        assert!(client.command(".").await.starts_with("250"));
        assert!(client.command("QUIT").await.starts_with("221"));

        let (session, messages) = client.finish().await;
        assert!(session.completed_normally);
        assert!(session.session_error.is_none());
        assert_eq!(session.client_name.as_deref(), Some("client.test"));
        assert_eq!(session.messages().len(), 1);

        let message = &messages[0];
        assert_eq!(message.from, "a@b.com");
        assert_eq!(message.recipients, vec!["c@d.com"]);
        assert_eq!(message.data, b"Subject: hi\r\n\r\n.");
    }

    #[tokio::test]
    async fn sequence_errors() {
        let mut client = TestClient::start(ServerOptions::default());
        client.line().await;

        assert!(client.command("DATA").await.starts_with("503"));
        assert!(client.command("RCPT TO:<c@d.com>").await.starts_with("503"));
        assert!(client.command("HELO one").await.starts_with("250"));
        assert!(client.command("EHLO two").await.starts_with("503"));
        assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("250"));
        assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("503"));
        assert!(client.command("RCPT TO:c@d.com").await.starts_with("501"));
        assert!(client.command("RCPT TO:<>").await.starts_with("501"));
        assert!(client.command("RSET").await.starts_with("250"));
        assert!(client.command("DATA").await.starts_with("503"));
        assert!(client.command("MAIL BOGUS:<a@b.com>").await.starts_with("504"));
        assert!(client.command("NOOP").await.starts_with("250"));
        client.command("QUIT").await;

        let (session, messages) = client.finish().await;
        assert!(session.completed_normally);
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn mail_from_parameters() {
        let mut client = TestClient::start(ServerOptions {
            max_message_size: Some(100),
            ..ServerOptions::default()
        });
        client.line().await;
        client.send("EHLO x").await;
        let ehlo = client.reply().await;
        assert!(ehlo.contains(&"250-SIZE 100".to_string()));

        assert!(client.command("MAIL FROM:<a@b.com> SIZE=500").await.starts_with("552"));
        assert!(client.command("MAIL FROM:<a@b.com> SIZE=abc").await.starts_with("501"));
        assert!(client.command("MAIL FROM:<a@b.com> BODY=9BIT").await.starts_with("501"));
        assert!(client.command("MAIL FROM:<a@b.com> FOO=1").await.starts_with("555"));
        assert!(client.command("MAIL FROM:<ü@b.com>").await.starts_with("501"));
        assert!(client.command("MAIL FROM:<ü@b.com> SMTPUTF8").await.starts_with("250"));
        assert!(client.command("RCPT TO:<ö@d.com>").await.starts_with("250"));
        client.command("QUIT").await;
    }

    #[tokio::test]
    async fn overlong_data_line_is_rejected() {
        let mut client = TestClient::start(ServerOptions::default());
        client.line().await;
        client.command("MAIL FROM:<a@b.com>").await;
        client.command("RCPT TO:<c@d.com>").await;
        client.command("DATA").await;
        client.send("Subject: flood").await;
        client.send(&"y".repeat(MAX_LINE_LENGTH + 1)).await;
        client.send("tail").await;
        assert_eq!(client.command(".").await, "552 Message exceeds fixed size limit");
        assert!(client.command("NOOP").await.starts_with("250"));
        client.command("QUIT").await;

        let (session, messages) = client.finish().await;
        assert!(session.completed_normally);
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let mut client = TestClient::start(ServerOptions {
            max_message_size: Some(10),
            ..ServerOptions::default()
        });
        client.line().await;
        client.command("MAIL FROM:<a@b.com>").await;
        client.command("RCPT TO:<c@d.com>").await;
        client.command("DATA").await;
        client.send("xxxxxxxxxxx").await;
        assert!(client.command(".").await.starts_with("552"));
        assert!(client.command("DATA").await.starts_with("503"));
        client.command("QUIT").await;

        let (_, messages) = client.finish().await;
        assert!(messages.is_empty());
    }
}

mod ehlo_tests {
    use super::*;

    /// EHLO keywords without the reply code and continuation marker.
    async fn keywords(options: ServerOptions) -> Vec<String> {
        let mut client = TestClient::start(options);
        client.line().await;
        client.send("EHLO client.test").await;
        let reply = client.reply().await;
        client.command("QUIT").await;
        client.finish().await;
        reply.iter().skip(1).map(|line| line[4..].to_string()).collect()
    }

    #[tokio::test]
    async fn size_keyword_follows_limit() {
        let limited = keywords(ServerOptions {
            max_message_size: Some(2048),
            ..ServerOptions::default()
        })
        .await;
        assert!(limited.contains(&"SIZE 2048".to_string()));

        for max_message_size in [None, Some(0)] {
            let unlimited = keywords(ServerOptions {
                max_message_size,
                ..ServerOptions::default()
            })
            .await;
            assert!(unlimited.contains(&"SIZE".to_string()));
            assert!(!unlimited.iter().any(|k| k.starts_with("SIZE ")));
        }
    }

    #[tokio::test]
    async fn auth_offer_follows_enabled_mechanisms() {
        let none_enabled = keywords(ServerOptions {
            smtp_enabled_auth_types_when_not_secure_connection: Vec::new(),
            ..ServerOptions::default()
        })
        .await;
        assert!(!none_enabled.iter().any(|k| k.starts_with("AUTH=")));
        assert!(none_enabled.contains(&"AUTH CRAM-MD5 PLAIN LOGIN ANONYMOUS XOAUTH2".to_string()));

        let login_only = keywords(ServerOptions {
            smtp_enabled_auth_types_when_not_secure_connection: vec!["login".to_string()],
            ..ServerOptions::default()
        })
        .await;
        assert!(login_only.contains(&"AUTH=LOGIN".to_string()));
    }

    #[tokio::test]
    async fn starttls_needs_a_certificate() {
        let without_certificate = keywords(ServerOptions {
            smtp_tls_mode: TlsMode::StartTls,
            ..ServerOptions::default()
        })
        .await;
        assert!(!without_certificate.contains(&"STARTTLS".to_string()));
        assert_eq!(
            without_certificate,
            [
                "8BITMIME",
                "SIZE",
                "AUTH=CRAM-MD5 PLAIN LOGIN",
                "AUTH CRAM-MD5 PLAIN LOGIN ANONYMOUS XOAUTH2",
                "SMTPUTF8"
            ]
        );
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn plain_with_initial_response() {
        let mut client = TestClient::start(strict_options());
        client.line().await;
        client.command("EHLO x").await;

        assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("530"));
        assert_eq!(
            client.command("AUTH PLAIN AHJvYgBzZWNyZXQ=").await,
            "235 Authenticated OK"
        );
        assert!(client.command("AUTH PLAIN AHJvYgBzZWNyZXQ=").await.starts_with("503"));
        assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("250"));
        client.command("QUIT").await;

        let (session, _) = client.finish().await;
        assert!(session.authenticated);
        assert_eq!(
            session.credentials.as_ref().and_then(|c| c.username()),
            Some("rob")
        );
    }

    #[tokio::test]
    async fn login_prompts_for_username_and_password() {
        let mut client = TestClient::start(strict_options());
        client.line().await;

        assert_eq!(client.command("AUTH LOGIN").await, "334 VXNlcm5hbWU6");
        assert_eq!(client.command("cm9i").await, "334 UGFzc3dvcmQ6");
        assert_eq!(client.command("c2VjcmV0").await, "235 Authenticated OK");
        client.command("QUIT").await;
    }

    #[tokio::test]
    async fn failures_keep_the_session_open() {
        let mut client = TestClient::start(strict_options());
        client.line().await;

        assert!(client.command("AUTH").await.starts_with("501"));
        assert!(client.command("AUTH GSSAPI").await.starts_with("504"));
        assert!(client.command("AUTH XOAUTH2").await.starts_with("538"));
        assert!(client.command("AUTH ANONYMOUS").await.starts_with("538"));

        assert_eq!(client.command("AUTH LOGIN").await, "334 VXNlcm5hbWU6");
        assert_eq!(client.command("!!!").await, "535 Bad Base64 data");

        assert_eq!(client.command("AUTH LOGIN").await, "334 VXNlcm5hbWU6");
        assert!(client.command("*").await.starts_with("501"));

        assert_eq!(client.command("AUTH LOGIN cm9i").await, "334 UGFzc3dvcmQ6");
        assert_eq!(client.command("d3Jvbmc=").await, "535 Authentication failure");

        assert!(client.command("NOOP").await.starts_with("250"));
        client.command("QUIT").await;

        let (session, _) = client.finish().await;
        assert!(!session.authenticated);
    }
}

mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let mut client = TestClient::start(ServerOptions::default());
        client.line().await;
        client.send("").await;
        assert!(client.command("NOOP").await.starts_with("250"));
        client.command("QUIT").await;
    }

    #[tokio::test]
    async fn overlong_command_line() {
        let mut client = TestClient::start(ServerOptions::default());
        client.line().await;
        let flood = format!("HELO {}", "z".repeat(MAX_LINE_LENGTH));
        assert_eq!(client.command(&flood).await, "500 Line too long");
        assert!(client.command("HELO short").await.starts_with("250"));
        client.command("QUIT").await;

        let (session, _) = client.finish().await;
        assert_eq!(session.client_name.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn overlong_auth_response() {
        let mut client = TestClient::start(strict_options());
        client.line().await;
        assert_eq!(client.command("AUTH LOGIN").await, "334 VXNlcm5hbWU6");
        assert_eq!(client.command(&"A".repeat(MAX_LINE_LENGTH + 1)).await, "500 Line too long");
        assert!(client.command("NOOP").await.starts_with("250"));
        client.command("QUIT").await;
    }

    #[tokio::test]
    async fn too_many_bad_commands() {
        let mut client = TestClient::start(ServerOptions {
            max_sequential_bad_commands: 3,
            ..ServerOptions::default()
        });
        client.line().await;

        assert_eq!(client.command("FOO").await, "500 Command unrecognised");
        assert_eq!(client.command("NOOP").await.get(..3), Some("250"));
        assert_eq!(client.command("FOO").await, "500 Command unrecognised");
        assert_eq!(client.command("@@@").await, "500 Command unrecognised");
        assert_eq!(client.command("BAR").await, "221 Too many bad commands. Bye!");

        let (session, _) = client.finish().await;
        assert!(!session.completed_normally);
        assert!(session.session_error.is_none());
    }

    #[tokio::test]
    async fn disconnect_is_a_network_error() {
        let mut client = TestClient::start(ServerOptions::default());
        client.line().await;
        client.send("MAIL FROM:<a@b.com>").await;
        client.reply().await;

        let (session, messages) = client.finish().await;
        assert!(!session.completed_normally);
        assert_eq!(session.session_error_kind, Some(SessionErrorKind::NetworkError));
        assert!(session.end_date.is_some());
        assert!(messages.is_empty());
        assert!(session.log().iter().any(|l| l == "<<MAIL FROM:<a@b.com>"));
    }
}
