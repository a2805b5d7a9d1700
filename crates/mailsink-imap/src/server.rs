//! TCP listener for the IMAP engine.

use std::net::SocketAddr;
use std::sync::Arc;

use mailsink_core::{LineChannel, MailboxRepository, MessagesRepository, ServerOptions};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::handler::SessionHandler;
use crate::session::run_session;

/// Accepts connections and runs one session task per client, each bound
/// to its own [`SessionHandler`].
pub struct ImapServer<R> {
    options: Arc<ServerOptions>,
    repository: R,
    cancel: CancellationToken,
}

impl<R> std::fmt::Debug for ImapServer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapServer")
            .field("port", &self.options.imap_port)
            .finish_non_exhaustive()
    }
}

impl<R: MessagesRepository + MailboxRepository + Clone + 'static> ImapServer<R> {
    /// Creates a server.
    #[must_use]
    pub const fn new(options: Arc<ServerOptions>, repository: R, cancel: CancellationToken) -> Self {
        Self {
            options,
            repository,
            cancel,
        }
    }

    /// Binds `addr`.
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "IMAP server listening");
        Ok(listener)
    }

    /// Accepts connections until cancelled.
    pub async fn run(&self, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "IMAP connection accepted");
                    let channel = LineChannel::new(
                        stream,
                        self.options.receive_timeout(),
                        self.cancel.child_token(),
                    );
                    let handler = SessionHandler::new(Arc::clone(&self.options), self.repository.clone());
                    tokio::spawn(async move {
                        run_session(channel, handler, &peer.to_string()).await;
                    });
                }
                Err(e) => error!(error = %e, "IMAP accept failed"),
            }
        }
        info!("IMAP server stopped");
    }
}
