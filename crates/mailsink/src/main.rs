//! `mailsink` - disposable mail-testing server.
//!
//! Accepts everything sent to it over SMTP and serves the captured messages
//! back over POP3 and IMAP. Usage: `mailsink [settings.json]`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod delivery;
mod tasks;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mailsink_core::{CertificateProvider, PemCertificateProvider, ServerOptions, SqliteRepository};
use mailsink_imap::ImapServer;
use mailsink_pop3::Pop3Server;
use mailsink_smtp::{OptionsServerBehaviour, SmtpServer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailsink=info,mailsink_smtp=info,mailsink_pop3=info,mailsink_imap=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = Arc::new(load_options().await?);
    info!(host = %options.host_name, "Starting mailsink");

    let repository = match &options.database_path {
        Some(path) => SqliteRepository::new(&path.to_string_lossy())
            .await
            .with_context(|| format!("opening database {}", path.display()))?,
        None => {
            info!("No database path configured, messages are kept in memory");
            SqliteRepository::in_memory().await?
        }
    };

    let tls_acceptor = PemCertificateProvider
        .tls_acceptor(&options)
        .context("loading TLS certificate")?;
    if tls_acceptor.is_none() {
        warn!("No TLS certificate configured, STARTTLS and STLS are unavailable");
    }

    let ip: IpAddr = options
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", options.bind_address))?;
    let cancel = CancellationToken::new();

    let (behaviour, messages) = OptionsServerBehaviour::new(Arc::clone(&options), tls_acceptor.clone());
    let smtp_listener = SmtpServer::bind(SocketAddr::new(ip, options.port)).await?;
    let smtp = SmtpServer::new(Arc::new(behaviour), cancel.clone());

    let pop3_listener = Pop3Server::<SqliteRepository>::bind(SocketAddr::new(ip, options.pop3_port)).await?;
    let pop3 = Pop3Server::new(
        Arc::clone(&options),
        repository.clone(),
        tls_acceptor,
        cancel.clone(),
    );

    let imap_listener = ImapServer::<SqliteRepository>::bind(SocketAddr::new(ip, options.imap_port)).await?;
    let imap = ImapServer::new(Arc::clone(&options), repository.clone(), cancel.clone());

    let smtp_task = tasks::spawn_listener("SMTP", cancel.clone(), async move {
        smtp.run(smtp_listener).await;
    });
    let pop3_task = tasks::spawn_listener("POP3", cancel.clone(), async move {
        pop3.run(pop3_listener).await;
    });
    let imap_task = tasks::spawn_listener("IMAP", cancel.clone(), async move {
        imap.run(imap_listener).await;
    });
    let delivery_options = Arc::clone(&options);
    let delivery_task =
        tokio::spawn(async move { delivery::run(repository, &delivery_options, messages).await });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");
    cancel.cancel();

    let (smtp, pop3, imap) = tokio::join!(smtp_task, pop3_task, imap_task);
    // The SMTP behaviour owns the only sender, so delivery drains and ends
    // once the SMTP server and its sessions are gone.
    let delivery = delivery_task.await.map(|()| false);

    let results = [
        ("SMTP", smtp),
        ("POP3", pop3),
        ("IMAP", imap),
        ("delivery", delivery),
    ];
    let clean = results
        .into_iter()
        .fold(true, |clean, (name, result)| tasks::finished(name, result) && clean);
    if clean {
        info!("mailsink stopped");
    } else {
        warn!("mailsink stopped after a task failure");
    }
    Ok(())
}

async fn load_options() -> Result<ServerOptions> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(ServerOptions::default_path);

    match path {
        Some(path) => ServerOptions::load(&path)
            .await
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(ServerOptions::default()),
    }
}
