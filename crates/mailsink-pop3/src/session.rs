//! The POP3 read-dispatch loop.

use mailsink_core::{MessagesRepository, TlsMode};
use tracing::{debug, error, info, warn};

use crate::context::Pop3SessionContext;
use crate::error::{Error, Result};
use crate::handlers::{CommandMap, Pop3Outcome};

/// Runs one POP3 session to completion.
///
/// On an implicit-TLS listener the handshake happens before the greeting;
/// if it fails, or no certificate is available, the connection is closed
/// without writing anything.
pub async fn run_session<R: MessagesRepository>(
    mut context: Pop3SessionContext<R>,
    commands: &CommandMap<R>,
) {
    info!(client = %context.client_address(), "POP3 session started");

    if let Err(error) = serve(&mut context, commands).await {
        if error.is_transport() {
            debug!(client = %context.client_address(), %error, "POP3 session ended by transport");
        } else {
            error!(client = %context.client_address(), %error, "POP3 session failed");
        }
    }

    if let Err(error) = context.shutdown().await {
        debug!(%error, "Shutdown after POP3 session failed");
    }
    info!(client = %context.client_address(), "POP3 session completed");
}

async fn serve<R: MessagesRepository>(
    context: &mut Pop3SessionContext<R>,
    commands: &CommandMap<R>,
) -> Result<()> {
    if context.tls_mode() == TlsMode::ImplicitTls {
        let Some(acceptor) = context.tls_acceptor().cloned() else {
            warn!("POP3 implicit TLS requested but no certificate is available");
            return Ok(());
        };
        context.upgrade_to_tls(&acceptor).await?;
        debug!(client = %context.client_address(), "POP3 implicit TLS established");
    }

    context.write_line("+OK smtp4dev POP3 server ready").await?;

    loop {
        let line = match context.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(Error::Core(mailsink_core::Error::LineTooLong(_))) => {
                context.write_line("-ERR Line too long").await?;
                continue;
            }
            Err(error) => return Err(error),
        };
        let (verb, argument) = match line.trim().split_once(' ') {
            Some((verb, rest)) => (verb.to_string(), Some(rest.trim().to_string())),
            None => (line.trim().to_string(), None),
        };
        if verb.is_empty() {
            continue;
        }

        let Some(handler) = commands.resolve(&verb) else {
            context.write_line("-ERR Unknown command").await?;
            continue;
        };

        match handler.execute(context, argument.as_deref()).await {
            Ok(Pop3Outcome::Continue) => {}
            Ok(Pop3Outcome::Quit) => break,
            Err(error) if error.is_transport() => return Err(error),
            Err(error) => {
                error!(%verb, %error, "POP3 command handler failed");
                context.write_line("-ERR Internal server error").await?;
            }
        }
    }
    Ok(())
}
