//! Verbs with no arguments.

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::types::{ReplyCode, SmtpResponse};

use super::{Flow, Verb, VerbFuture};

/// `RSET`: discards the open message.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsetVerb;

impl Verb for RsetVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, _command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            connection.abort_message();
            connection
                .write_response(&SmtpResponse::new(ReplyCode::OK, "Rset completed"))
                .await?;
            Ok(Flow::Continue)
        })
    }
}

/// `NOOP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVerb;

impl Verb for NoopVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, _command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            connection
                .write_response(&SmtpResponse::new(ReplyCode::OK, "Successfully did nothing"))
                .await?;
            Ok(Flow::Continue)
        })
    }
}

/// `QUIT`: says goodbye and ends the session normally.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuitVerb;

impl Verb for QuitVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, _command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            connection
                .write_response(&SmtpResponse::new(ReplyCode::CLOSING, "See you later aligator"))
                .await?;
            connection.session_mut().completed_normally = true;
            Ok(Flow::Close)
        })
    }
}
