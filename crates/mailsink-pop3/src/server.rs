//! TCP listener for the POP3 engine.

use std::net::SocketAddr;
use std::sync::Arc;

use mailsink_core::{MessagesRepository, ServerOptions};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::Pop3SessionContext;
use crate::error::Result;
use crate::handlers::CommandMap;
use crate::session::run_session;

/// Accepts connections and runs one session task per client.
pub struct Pop3Server<R> {
    options: Arc<ServerOptions>,
    repository: R,
    tls_acceptor: Option<TlsAcceptor>,
    commands: Arc<CommandMap<R>>,
    cancel: CancellationToken,
}

impl<R> std::fmt::Debug for Pop3Server<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Server")
            .field("tls_mode", &self.options.effective_pop3_tls_mode())
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl<R: MessagesRepository + Clone + 'static> Pop3Server<R> {
    /// Creates a server with the standard command set.
    #[must_use]
    pub fn new(
        options: Arc<ServerOptions>,
        repository: R,
        tls_acceptor: Option<TlsAcceptor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            repository,
            tls_acceptor,
            commands: Arc::new(CommandMap::standard()),
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
        info!(%addr, "POP3 server listening");
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
                    debug!(%peer, "POP3 connection accepted");
                    let context = Pop3SessionContext::new(
                        stream,
                        Arc::clone(&self.options),
                        self.repository.clone(),
                        self.tls_acceptor.clone(),
                        peer.to_string(),
                        self.cancel.child_token(),
                    );
                    let commands = Arc::clone(&self.commands);
                    tokio::spawn(async move { run_session(context, &commands).await });
                }
                Err(e) => error!(error = %e, "POP3 accept failed"),
            }
        }
        info!("POP3 server stopped");
    }
}
