//! Server policy hooks.
//!
//! [`ServerBehaviour`] is consulted by the connection for every policy
//! decision (limits, TLS, extensions, credentials) and notified of session
//! and message events. [`OptionsServerBehaviour`] implements it from
//! [`ServerOptions`] and forwards received messages over a channel.

use std::sync::Arc;
use std::time::Duration;

use mailsink_core::ServerOptions;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::auth::{AuthenticationCredentials, AuthenticationResult, cram_md5_digest};
use crate::command::SmtpCommand;
use crate::error::Result;
use crate::extensions::{self, Extension};
use crate::message::{Message, MessageBuilder};
use crate::session::Session;
use crate::types::AuthMechanism;

/// Policy and event hooks for an SMTP server.
///
/// Everything except [`domain_name`](Self::domain_name) has a default.
pub trait ServerBehaviour: Send + Sync {
    /// Domain announced in the greeting and EHLO reply.
    fn domain_name(&self) -> &str;

    /// Maximum accepted message size in bytes.
    fn maximum_message_size(&self) -> Option<u64> {
        None
    }

    /// Consecutive unrecognised commands before disconnecting; 0 disables.
    fn maximum_sequential_bad_commands(&self) -> u32 {
        10
    }

    /// Idle timeout for each read.
    fn receive_timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    /// Acceptor for STARTTLS and implicit TLS.
    fn tls_acceptor(&self) -> Option<TlsAcceptor> {
        None
    }

    /// Whether TLS starts before the greeting.
    fn is_implicit_tls(&self) -> bool {
        false
    }

    /// Whether MAIL FROM requires a prior successful AUTH.
    fn is_authentication_required(&self) -> bool {
        false
    }

    /// Extensions instantiated for each new connection.
    fn extensions(&self) -> Vec<Box<dyn Extension>> {
        extensions::default_extensions()
    }

    /// Whether a mechanism may be used on a connection with this security.
    fn is_auth_mechanism_enabled(&self, _mechanism: AuthMechanism, _secure: bool) -> bool {
        true
    }

    /// Validates completed AUTH credentials.
    fn validate_credentials(&self, _credentials: &AuthenticationCredentials) -> AuthenticationResult {
        AuthenticationResult::Failure
    }

    /// Called once the connection is accepted.
    fn on_session_started(&self, _session: &Session) {}

    /// Called for every line read in command mode.
    fn on_command_received(&self, _command: &SmtpCommand) {}

    /// Called before MAIL FROM is acknowledged; an error rejects it.
    ///
    /// # Errors
    ///
    /// Returns the response to send instead of `250`.
    fn on_message_start(&self, _from: &str) -> Result<()> {
        Ok(())
    }

    /// Called before a recipient is added; an error rejects it.
    ///
    /// # Errors
    ///
    /// Returns the response to send instead of `250`.
    fn on_message_recipient_adding(&self, _message: &MessageBuilder, _recipient: &str) -> Result<()> {
        Ok(())
    }

    /// Called after DATA completes and the message is committed.
    fn on_message_received(&self, _message: &Message) {}

    /// Called after the connection closes.
    fn on_session_completed(&self, _session: &Session) {}
}

/// [`ServerBehaviour`] backed by [`ServerOptions`].
///
/// A `maxMessageSize` of 0 means no limit, as with the `SIZE 0` keyword.
/// The acceptor is only handed out when `smtpTlsMode` is not `None`.
///
/// Committed messages are sent to the receiver returned by
/// [`OptionsServerBehaviour::new`].
#[derive(Clone)]
pub struct OptionsServerBehaviour {
    options: Arc<ServerOptions>,
    tls_acceptor: Option<TlsAcceptor>,
    messages: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for OptionsServerBehaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsServerBehaviour")
            .field("domain", &self.options.host_name)
            .field("tls", &self.tls_acceptor.is_some())
            .finish_non_exhaustive()
    }
}

impl OptionsServerBehaviour {
    /// Creates the behaviour and the receiving end of its message channel.
    #[must_use]
    pub fn new(
        options: Arc<ServerOptions>,
        tls_acceptor: Option<TlsAcceptor>,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (messages, receiver) = mpsc::unbounded_channel();
        (
            Self {
                options,
                tls_acceptor,
                messages,
            },
            receiver,
        )
    }

    fn check_password(&self, username: &str, password: &str) -> bool {
        self.options.check_password(username, password)
    }
}

impl ServerBehaviour for OptionsServerBehaviour {
    fn domain_name(&self) -> &str {
        &self.options.host_name
    }

    fn maximum_message_size(&self) -> Option<u64> {
        self.options.max_message_size.filter(|&max| max > 0)
    }

    fn maximum_sequential_bad_commands(&self) -> u32 {
        self.options.max_sequential_bad_commands
    }

    fn receive_timeout(&self) -> Duration {
        self.options.receive_timeout()
    }

    fn tls_acceptor(&self) -> Option<TlsAcceptor> {
        self.tls_acceptor
            .clone()
            .filter(|_| self.options.smtp_tls_mode != mailsink_core::TlsMode::None)
    }

    fn is_implicit_tls(&self) -> bool {
        self.options.smtp_tls_mode == mailsink_core::TlsMode::ImplicitTls
    }

    fn is_authentication_required(&self) -> bool {
        self.options.authentication_required
    }

    fn is_auth_mechanism_enabled(&self, mechanism: AuthMechanism, secure: bool) -> bool {
        if mechanism == AuthMechanism::Anonymous && self.options.authentication_required {
            return false;
        }

        let enabled = if secure {
            &self.options.smtp_enabled_auth_types_when_secure_connection
        } else {
            &self.options.smtp_enabled_auth_types_when_not_secure_connection
        };
        enabled
            .iter()
            .any(|name| name.eq_ignore_ascii_case(mechanism.as_str()))
    }

    fn validate_credentials(&self, credentials: &AuthenticationCredentials) -> AuthenticationResult {
        if self.options.smtp_allow_any_credentials {
            return AuthenticationResult::Success;
        }

        let ok = match credentials {
            AuthenticationCredentials::UsernameAndPassword { username, password }
            | AuthenticationCredentials::Plain {
                username, password, ..
            } => self.check_password(username, password),
            AuthenticationCredentials::CramMd5 {
                username,
                challenge,
                response,
            } => self.options.find_user(username).is_some_and(|user| {
                cram_md5_digest(challenge, &user.password).eq_ignore_ascii_case(response)
            }),
            AuthenticationCredentials::XOAuth2 {
                username,
                access_token,
            } => self.check_password(username, access_token),
            AuthenticationCredentials::Anonymous => !self.options.authentication_required,
        };
        AuthenticationResult::from(ok)
    }

    fn on_message_received(&self, message: &Message) {
        debug!(
            from = %message.from,
            recipients = message.recipients.len(),
            size = message.data.len(),
            "Message received"
        );
        if self.messages.send(message.clone()).is_err() {
            warn!("Message receiver dropped; message discarded");
        }
    }

    fn on_session_completed(&self, session: &Session) {
        debug!(
            client = %session.client_address,
            messages = session.messages().len(),
            completed_normally = session.completed_normally,
            "SMTP session completed"
        );
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use mailsink_core::UserOptions;

    fn strict_options() -> ServerOptions {
        ServerOptions {
            smtp_allow_any_credentials: false,
            users: vec![UserOptions {
                username: "Rob".to_string(),
                password: "secret".to_string(),
                default_mailbox: None,
            }],
            ..ServerOptions::default()
        }
    }

    fn behaviour(options: ServerOptions) -> OptionsServerBehaviour {
        OptionsServerBehaviour::new(Arc::new(options), None).0
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn password_mechanisms() {
            let b = behaviour(strict_options());
            let login = AuthenticationCredentials::UsernameAndPassword {
                username: "rob".to_string(),
                password: "secret".to_string(),
            };
            assert_eq!(b.validate_credentials(&login), AuthenticationResult::Success);

            let plain = AuthenticationCredentials::Plain {
                authzid: String::new(),
                username: "rob".to_string(),
                password: "nope".to_string(),
            };
            assert_eq!(b.validate_credentials(&plain), AuthenticationResult::Failure);
        }

        #[test]
        fn cram_md5_recomputes_digest() {
            let b = behaviour(strict_options());
            let challenge = "1234.10000@mockdomain".to_string();
            let good = AuthenticationCredentials::CramMd5 {
                username: "rob".to_string(),
                response: cram_md5_digest(&challenge, "secret"),
                challenge: challenge.clone(),
            };
            assert_eq!(b.validate_credentials(&good), AuthenticationResult::Success);

            let bad = AuthenticationCredentials::CramMd5 {
                username: "rob".to_string(),
                response: cram_md5_digest(&challenge, "other"),
                challenge,
            };
            assert_eq!(b.validate_credentials(&bad), AuthenticationResult::Failure);
        }

        #[test]
        fn xoauth2_token_is_password() {
            let b = behaviour(strict_options());
            let creds = AuthenticationCredentials::XOAuth2 {
                username: "rob".to_string(),
                access_token: "secret".to_string(),
            };
            assert_eq!(b.validate_credentials(&creds), AuthenticationResult::Success);
        }

        #[test]
        fn allow_any_credentials() {
            let b = behaviour(ServerOptions::default());
            let creds = AuthenticationCredentials::UsernameAndPassword {
                username: "nobody".to_string(),
                password: "x".to_string(),
            };
            assert_eq!(b.validate_credentials(&creds), AuthenticationResult::Success);
        }
    }

    mod mechanism_tests {
        use super::*;

        #[test]
        fn enablement_depends_on_security() {
            let b = behaviour(ServerOptions::default());
            assert!(b.is_auth_mechanism_enabled(AuthMechanism::Plain, false));
            assert!(!b.is_auth_mechanism_enabled(AuthMechanism::XOAuth2, false));
            assert!(b.is_auth_mechanism_enabled(AuthMechanism::XOAuth2, true));
        }

        #[test]
        fn anonymous_disabled_when_auth_required() {
            let b = behaviour(ServerOptions {
                authentication_required: true,
                ..ServerOptions::default()
            });
            assert!(!b.is_auth_mechanism_enabled(AuthMechanism::Anonymous, true));
        }
    }

    #[test]
    fn zero_message_size_is_unlimited() {
        let limited = behaviour(ServerOptions {
            max_message_size: Some(2048),
            ..ServerOptions::default()
        });
        assert_eq!(limited.maximum_message_size(), Some(2048));

        let unlimited = behaviour(ServerOptions {
            max_message_size: Some(0),
            ..ServerOptions::default()
        });
        assert_eq!(unlimited.maximum_message_size(), None);
    }

    #[test]
    fn messages_are_forwarded() {
        let (b, mut rx) = OptionsServerBehaviour::new(Arc::new(ServerOptions::default()), None);
        let mut builder = MessageBuilder::new(false);
        builder.set_from("a@b.com");
        b.on_message_received(&builder.finish());
        assert_eq!(rx.try_recv().unwrap().from, "a@b.com");
    }
}
