//! RCPT TO.

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ReplyCode, SmtpResponse};

use super::mail::{check_address_encoding, strip_angle_brackets};
use super::{Flow, Verb, VerbFuture, VerbMap};

/// `RCPT`: dispatches `TO` into its sub-verb map.
#[derive(Debug, Clone)]
pub struct RcptVerb {
    sub_verbs: VerbMap,
}

impl RcptVerb {
    /// Creates the verb with `TO` registered.
    #[must_use]
    pub fn new() -> Self {
        let mut sub_verbs = VerbMap::new();
        sub_verbs.set_verb_processor("TO", RcptToVerb);
        Self { sub_verbs }
    }
}

impl Default for RcptVerb {
    fn default() -> Self {
        Self::new()
    }
}

impl Verb for RcptVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(self.sub_verbs.dispatch_sub_verb(connection, command))
    }
}

/// `TO <address>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RcptToVerb;

impl Verb for RcptToVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            add_recipient(connection, command.arguments_text())?;
            connection
                .write_response(&SmtpResponse::new(ReplyCode::OK, "Recipient accepted"))
                .await?;
            Ok(Flow::Continue)
        })
    }
}

fn add_recipient(connection: &mut Connection, argument: &str) -> Result<()> {
    if connection.current_message().is_none() {
        return Err(Error::response(
            ReplyCode::BAD_SEQUENCE,
            "Must specify from address before recipients",
        ));
    }

    let address = strip_angle_brackets(argument);
    if address.len() == argument.len() || address.is_empty() {
        return Err(Error::response(
            ReplyCode::PARAMETER_ERROR,
            "Must specify to address <address@domain>",
        ));
    }
    check_address_encoding(connection, address)?;

    let behaviour = connection.behaviour().clone();
    if let Some(message) = connection.current_message_mut() {
        behaviour.on_message_recipient_adding(message, address)?;
        message.add_recipient(address);
    }
    Ok(())
}
