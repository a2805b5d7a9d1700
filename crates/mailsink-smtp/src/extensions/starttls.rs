use tracing::debug;

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::Error;
use crate::types::{ReplyCode, SmtpResponse};
use crate::verbs::{Flow, Verb, VerbFuture};

use super::{Extension, ExtensionProcessor};

/// `STARTTLS` (RFC 3207).
///
/// Only advertised on a plaintext connection when a certificate is
/// available.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartTlsExtension;

impl Extension for StartTlsExtension {
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor> {
        connection
            .verb_map_mut()
            .set_verb_processor("STARTTLS", StartTlsVerb);
        Box::new(StartTlsProcessor)
    }
}

struct StartTlsProcessor;

impl ExtensionProcessor for StartTlsProcessor {
    fn ehlo_keywords(&self, connection: &Connection) -> Vec<String> {
        if connection.is_secure() || connection.behaviour().tls_acceptor().is_none() {
            Vec::new()
        } else {
            vec!["STARTTLS".to_string()]
        }
    }
}

/// Upgrades the connection in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartTlsVerb;

impl Verb for StartTlsVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, _command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            if connection.behaviour().tls_acceptor().is_none() {
                return Err(Error::response(
                    ReplyCode::TLS_NOT_AVAILABLE,
                    "TLS not available due to temporary reason",
                ));
            }
            if connection.is_secure() {
                return Err(Error::response(
                    ReplyCode::BAD_SEQUENCE,
                    "Connection is already secure",
                ));
            }

            connection
                .write_response(&SmtpResponse::new(
                    ReplyCode::SERVICE_READY,
                    "Ready to start TLS",
                ))
                .await?;
            debug!(client = %connection.session().client_address, "Starting TLS");
            connection.upgrade_to_tls().await?;
            Ok(Flow::Continue)
        })
    }
}
