//! STARTTLS upgrades against the fixture certificate in mailsink-core.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use mailsink_core::{ServerOptions, TlsMode};
use mailsink_core::tls::load_server_config;
use mailsink_smtp::{Connection, Message, OptionsServerBehaviour, Session};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tokio_util::sync::CancellationToken;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../mailsink-core/tests/fixtures").join(name)
}

fn acceptor() -> TlsAcceptor {
    let config = load_server_config(&fixture("cert.pem"), &fixture("key.pem")).unwrap();
    TlsAcceptor::from(Arc::new(config))
}

fn connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_file_iter(fixture("ca.pem")).unwrap() {
        roots.add(cert.unwrap()).unwrap();
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Line client over either side of the upgrade.
struct Client<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

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

    async fn send(&mut self, line: &str) {
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\r\n").await.unwrap();
        stream.flush().await.unwrap();
    }

    async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.reply().await.pop().unwrap()
    }

    async fn ehlo(&mut self) -> Vec<String> {
        self.send("EHLO client.test").await;
        self.reply().await
    }
}

impl Client<DuplexStream> {
    async fn upgrade(self) -> Client<TlsStream<DuplexStream>> {
        let name = ServerName::try_from("localhost").unwrap();
        let tls = connector().connect(name, self.stream.into_inner()).await.unwrap();
        Client {
            stream: BufReader::new(tls),
        }
    }
}

fn start(
    options: ServerOptions,
) -> (Client<DuplexStream>, JoinHandle<Session>, UnboundedReceiver<Message>) {
    let (server, client) = tokio::io::duplex(64 * 1024);
    let (behaviour, messages) = OptionsServerBehaviour::new(Arc::new(options), Some(acceptor()));
    let connection = Connection::new(
        server,
        Arc::new(behaviour),
        "127.0.0.1:40025",
        CancellationToken::new(),
    );
    let session = tokio::spawn(connection.process());
    let client = Client {
        stream: BufReader::new(client),
    };
    (client, session, messages)
}

fn starttls_options() -> ServerOptions {
    ServerOptions {
        smtp_tls_mode: TlsMode::StartTls,
        ..ServerOptions::default()
    }
}

fn auth_line(ehlo: &[String]) -> &str {
    ehlo.iter()
        .find_map(|line| line.strip_prefix("250-AUTH="))
        .unwrap_or_default()
}

#[tokio::test]
async fn upgrade_resets_the_session() {
    let (mut client, session, mut messages) = start(starttls_options());
    assert!(client.line().await.starts_with("220"));

    let plain = client.ehlo().await;
    assert!(plain.contains(&"250-STARTTLS".to_string()));
    assert!(!auth_line(&plain).contains("ANONYMOUS"));
    assert_eq!(client.command("AUTH ANONYMOUS").await.get(..3), Some("538"));
    assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("250"));

    assert_eq!(client.command("STARTTLS").await, "220 Ready to start TLS");
    let mut client = client.upgrade().await;

    let secure = client.ehlo().await;
    assert_eq!(secure[0], "250-localhost Nice to meet you.");
    assert!(!secure.iter().any(|line| line.contains("STARTTLS")));
    assert!(auth_line(&secure).contains("ANONYMOUS"));
    assert!(auth_line(&secure).contains("XOAUTH2"));

    assert!(client.command("RCPT TO:<c@d.com>").await.starts_with("503"));
    assert!(client.command("STARTTLS").await.starts_with("503"));
    assert_eq!(client.command("AUTH ANONYMOUS").await, "235 Authenticated OK");

    assert!(client.command("MAIL FROM:<a@b.com>").await.starts_with("250"));
    assert!(client.command("RCPT TO:<c@d.com>").await.starts_with("250"));
    assert!(client.command("DATA").await.starts_with("354"));
    client.send("Subject: sealed").await;
    client.send("").await;
    client.send("body").await;
    assert!(client.command(".").await.starts_with("250"));
    assert!(client.command("QUIT").await.starts_with("221"));
    drop(client);

    let session = session.await.unwrap();
    assert!(session.secure_connection);
    assert!(session.authenticated);
    assert_eq!(session.client_name.as_deref(), Some("client.test"));

    let message = messages.try_recv().unwrap();
    assert!(message.secure_connection);
    assert_eq!(message.data, b"Subject: sealed\r\n\r\nbody");
    assert!(messages.try_recv().is_err());
}

#[tokio::test]
async fn helo_is_accepted_again_after_upgrade() {
    let (mut client, session, _messages) = start(starttls_options());
    client.line().await;

    assert!(client.command("HELO first").await.starts_with("250"));
    assert!(client.command("HELO again").await.starts_with("503"));
    client.command("STARTTLS").await;
    let mut client = client.upgrade().await;

    assert!(client.command("HELO second").await.starts_with("250"));
    assert!(client.command("QUIT").await.starts_with("221"));
    drop(client);

    let session = session.await.unwrap();
    assert_eq!(session.client_name.as_deref(), Some("second"));
}

#[tokio::test]
async fn acceptor_is_unused_without_starttls_mode() {
    let (mut client, session, _messages) = start(ServerOptions::default());
    client.line().await;

    let ehlo = client.ehlo().await;
    assert!(!ehlo.iter().any(|line| line.contains("STARTTLS")));
    assert!(client.command("STARTTLS").await.starts_with("454"));
    client.command("QUIT").await;
    drop(client);

    assert!(!session.await.unwrap().secure_connection);
}
