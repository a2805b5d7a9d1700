//! Session-level commands: QUIT, CAPA, STLS and the unknown-command fallback.

use mailsink_core::{MessagesRepository, TlsMode};
use tracing::{debug, warn};

use crate::context::Pop3SessionContext;

use super::{CommandHandler, HandlerFuture, Pop3Outcome, reject};

/// `QUIT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuitCommand;

impl<R: MessagesRepository> CommandHandler<R> for QuitCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            context.write_line("+OK Bye").await?;
            Ok(Pop3Outcome::Quit)
        })
    }
}

/// `CAPA`: USER, TOP and UIDL, plus STLS on a plaintext STARTTLS listener.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapaCommand;

impl<R: MessagesRepository> CommandHandler<R> for CapaCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let offer_stls = context.tls_mode() == TlsMode::StartTls && !context.is_secure();

            context.write_line("+OK Capability list follows").await?;
            for capability in ["USER", "TOP", "UIDL"] {
                context.write_line(capability).await?;
            }
            if offer_stls {
                context.write_line("STLS").await?;
            }
            context.write_line(".").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `STLS` (RFC 2595): in-place TLS upgrade.
#[derive(Debug, Default, Clone, Copy)]
pub struct StlsCommand;

impl<R: MessagesRepository> CommandHandler<R> for StlsCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if context.tls_mode() != TlsMode::StartTls {
                return reject(context, "STLS not supported").await;
            }
            if context.is_secure() {
                return reject(context, "Already using TLS").await;
            }
            let Some(acceptor) = context.tls_acceptor().cloned() else {
                return reject(context, "TLS not available").await;
            };

            context.write_line("+OK Begin TLS negotiation").await?;
            match context.upgrade_to_tls(&acceptor).await {
                Ok(()) => {
                    debug!(client = %context.client_address(), "POP3 TLS established");
                    Ok(Pop3Outcome::Continue)
                }
                Err(error) => {
                    warn!(client = %context.client_address(), %error, "POP3 STLS handshake failed");
                    if context.write_line("-ERR TLS negotiation failed").await.is_err() {
                        debug!("Channel closed after failed handshake");
                    }
                    Ok(Pop3Outcome::Quit)
                }
            }
        })
    }
}

/// Fallback for unregistered commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownCommand;

impl<R: MessagesRepository> CommandHandler<R> for UnknownCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(reject(context, "Unknown command"))
    }
}
