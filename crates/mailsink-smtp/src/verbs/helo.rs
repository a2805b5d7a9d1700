//! HELO and EHLO.

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ReplyCode, SmtpResponse};

use super::{Flow, Verb, VerbFuture};

fn greet(connection: &mut Connection, command: &SmtpCommand) -> Result<()> {
    if connection.session().client_name.is_some() {
        return Err(Error::response(
            ReplyCode::BAD_SEQUENCE,
            "You already said HELO",
        ));
    }
    connection.session_mut().client_name = Some(command.arguments_text().to_string());
    Ok(())
}

/// `HELO <domain>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeloVerb;

impl Verb for HeloVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            greet(connection, command)?;
            let response = SmtpResponse::new(ReplyCode::OK, "Nice to meet you");
            connection.write_response(&response).await?;
            Ok(Flow::Continue)
        })
    }
}

/// `EHLO <domain>`; lists the keywords of every extension processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct EhloVerb;

impl Verb for EhloVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            greet(connection, command)?;

            let shared: &Connection = connection;
            let mut lines = vec![format!(
                "{} Nice to meet you.",
                shared.behaviour().domain_name()
            )];
            lines.extend(
                shared
                    .extension_processors()
                    .iter()
                    .flat_map(|processor| processor.ehlo_keywords(shared)),
            );

            connection
                .write_response(&SmtpResponse::multiline(ReplyCode::OK, lines))
                .await?;
            Ok(Flow::Continue)
        })
    }
}
