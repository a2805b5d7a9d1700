//! STLS upgrades against the fixture certificate in mailsink-core.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use mailsink_core::tls::load_server_config;
use mailsink_core::{
    DEFAULT_MAILBOX, MessagesRepository, NewMessage, ServerOptions, SqliteRepository, TlsMode,
};
use mailsink_pop3::{CommandMap, Pop3SessionContext, run_session};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tokio_util::sync::CancellationToken;

const MESSAGE: &[u8] = b"Subject: sealed\r\n\r\nbody\r\n";

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

struct Client<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    async fn command(&mut self, line: &str) -> String {
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\r\n").await.unwrap();
        stream.flush().await.unwrap();
        self.line().await
    }

    /// Reads lines up to and including the terminating `.`.
    async fn multiline(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            let done = line == ".";
            lines.push(line);
            if done {
                return lines;
            }
        }
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

async fn start(mode: TlsMode) -> (Client<DuplexStream>, JoinHandle<()>) {
    let repository = SqliteRepository::in_memory().await.unwrap();
    repository
        .add_message(DEFAULT_MAILBOX, None, NewMessage::from_data(MESSAGE.to_vec()))
        .await
        .unwrap();

    let options = ServerOptions {
        pop3_tls_mode: Some(mode),
        ..ServerOptions::default()
    };
    let (server, client) = tokio::io::duplex(64 * 1024);
    let context = Pop3SessionContext::new(
        server,
        Arc::new(options),
        repository,
        Some(acceptor()),
        "127.0.0.1:40995",
        CancellationToken::new(),
    );
    let session = tokio::spawn(async move {
        run_session(context, &CommandMap::standard()).await;
    });
    let client = Client {
        stream: BufReader::new(client),
    };
    (client, session)
}

#[tokio::test]
async fn stls_upgrade_then_read_mail() {
    let (mut client, session) = start(TlsMode::StartTls).await;
    assert_eq!(client.line().await, "+OK smtp4dev POP3 server ready");

    client.command("CAPA").await;
    assert!(client.multiline().await.contains(&"STLS".to_string()));

    assert_eq!(client.command("STLS").await, "+OK Begin TLS negotiation");
    let mut client = client.upgrade().await;

    assert!(client.command("CAPA").await.starts_with("+OK"));
    assert_eq!(client.multiline().await, ["USER", "TOP", "UIDL", "."]);
    assert_eq!(client.command("STLS").await, "-ERR Already using TLS");

    assert!(client.command("USER rob").await.starts_with("+OK"));
    assert!(client.command("PASS secret").await.starts_with("+OK"));
    assert_eq!(client.command("STAT").await, format!("+OK 1 {}", MESSAGE.len()));
    assert_eq!(
        client.command("RETR 1").await,
        format!("+OK {} octets", MESSAGE.len())
    );
    assert_eq!(client.multiline().await, ["Subject: sealed", "", "body", "."]);
    assert_eq!(client.command("QUIT").await, "+OK Bye");
    drop(client);
    session.await.unwrap();
}

#[tokio::test]
async fn implicit_tls_greets_after_handshake() {
    let (client, session) = start(TlsMode::ImplicitTls).await;
    let mut client = client.upgrade().await;

    assert_eq!(client.line().await, "+OK smtp4dev POP3 server ready");
    client.command("CAPA").await;
    assert!(!client.multiline().await.contains(&"STLS".to_string()));
    assert_eq!(client.command("QUIT").await, "+OK Bye");
    drop(client);
    session.await.unwrap();
}
