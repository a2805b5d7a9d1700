//! TCP listener for the SMTP engine.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::behaviour::ServerBehaviour;
use crate::connection::Connection;
use crate::error::Result;

/// Accepts connections and runs one [`Connection`] task per client.
#[derive(Clone)]
pub struct SmtpServer {
    behaviour: Arc<dyn ServerBehaviour>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SmtpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpServer")
            .field("domain", &self.behaviour.domain_name())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl SmtpServer {
    /// Creates a server; cancelling `cancel` stops the accept loop and every
    /// open session.
    #[must_use]
    pub fn new(behaviour: Arc<dyn ServerBehaviour>, cancel: CancellationToken) -> Self {
        Self { behaviour, cancel }
    }

    /// Binds `addr`.
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "SMTP server listening");
        Ok(listener)
    }

    /// Accepts connections until cancelled.
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn run(&self, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "SMTP connection accepted");
                    let connection = Connection::new(
                        stream,
                        Arc::clone(&self.behaviour),
                        peer.to_string(),
                        self.cancel.child_token(),
                    );
                    tokio::spawn(connection.process());
                }
                Err(e) => error!(error = %e, "SMTP accept failed"),
            }
        }
        info!("SMTP server stopped");
    }
}
