//! Per-connection POP3 state.

use std::sync::Arc;

use mailsink_core::{
    AsyncStream, DEFAULT_MAILBOX, LineChannel, MessagesRepository, ServerOptions, StoredMessage,
    TlsMode,
};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::Result;

/// Mutable state owned by one POP3 connection.
///
/// The channel carries the stream together with its line reader and writer,
/// so a TLS upgrade replaces all three at once. Once [`is_authenticated`]
/// turns true it stays true for the rest of the connection.
///
/// [`is_authenticated`]: Self::is_authenticated
pub struct Pop3SessionContext<R> {
    channel: LineChannel,
    username: Option<String>,
    authenticated: bool,
    options: Arc<ServerOptions>,
    repository: R,
    tls_acceptor: Option<TlsAcceptor>,
    client_address: String,
}

impl<R> std::fmt::Debug for Pop3SessionContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3SessionContext")
            .field("client", &self.client_address)
            .field("username", &self.username)
            .field("authenticated", &self.authenticated)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl<R: MessagesRepository> Pop3SessionContext<R> {
    /// Creates the context for an accepted stream.
    pub fn new(
        stream: impl AsyncStream + 'static,
        options: Arc<ServerOptions>,
        repository: R,
        tls_acceptor: Option<TlsAcceptor>,
        client_address: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        let channel = LineChannel::new(stream, options.receive_timeout(), cancel);
        Self {
            channel,
            username: None,
            authenticated: false,
            options,
            repository,
            tls_acceptor,
            client_address: client_address.into(),
        }
    }

    /// Returns the server options.
    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Returns the peer address.
    #[must_use]
    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    /// Returns the name given by USER.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Records the name given by USER.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    /// Returns true after a successful PASS.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Marks the session authenticated.
    pub const fn authenticate(&mut self) {
        self.authenticated = true;
    }

    /// Returns the cancellation signal for this session.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        self.channel.cancellation()
    }

    /// Returns true once the stream is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.channel.is_secure()
    }

    /// POP3 TLS mode in effect for this listener.
    #[must_use]
    pub fn tls_mode(&self) -> TlsMode {
        self.options.effective_pop3_tls_mode()
    }

    /// Mailbox this session reads.
    ///
    /// The user's configured mailbox when authentication is required,
    /// otherwise the shared default mailbox.
    #[must_use]
    pub fn mailbox(&self) -> String {
        if self.options.authentication_required {
            self.options.mailbox_for_user(self.username.as_deref())
        } else {
            DEFAULT_MAILBOX.to_string()
        }
    }

    /// Re-reads the maildrop in repository order.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn messages(&self) -> Result<Vec<StoredMessage>> {
        let mailbox = self.mailbox();
        Ok(self.repository.get_messages(&mailbox, None, false).await?)
    }

    /// Returns the message at a 1-based maildrop index.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn message_at(&self, index: usize) -> Result<Option<StoredMessage>> {
        let messages = self.messages().await?;
        Ok(index
            .checked_sub(1)
            .and_then(|i| messages.into_iter().nth(i)))
    }

    /// Returns the repository handle.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Reads one command line; `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.channel.read_text_line().await?)
    }

    /// Writes one response line.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        Ok(self.channel.write_line(line).await?)
    }

    /// Writes a message body dot-stuffed and terminated.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn write_dot_stuffed(&mut self, data: &[u8]) -> Result<()> {
        codec::write_dot_stuffed_message(&mut self.channel, data).await
    }

    /// Returns the acceptor for STLS and implicit TLS.
    #[must_use]
    pub const fn tls_acceptor(&self) -> Option<&TlsAcceptor> {
        self.tls_acceptor.as_ref()
    }

    /// Swaps the stream for a TLS stream after a server-side handshake.
    ///
    /// # Errors
    ///
    /// Returns the handshake error; the channel is unusable afterwards.
    pub async fn upgrade_to_tls(&mut self, acceptor: &TlsAcceptor) -> Result<()> {
        Ok(self.channel.upgrade_to_tls(acceptor).await?)
    }

    /// Shuts the stream down.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn shutdown(&mut self) -> Result<()> {
        Ok(self.channel.shutdown().await?)
    }
}
