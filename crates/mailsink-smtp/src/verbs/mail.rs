//! MAIL FROM.

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::parameters::ParameterProcessorMap;
use crate::types::{ReplyCode, SmtpResponse};

use super::{Flow, Verb, VerbFuture, VerbMap};

/// `MAIL`: dispatches `FROM` into its sub-verb map.
#[derive(Debug, Clone)]
pub struct MailVerb {
    sub_verbs: VerbMap,
}

impl MailVerb {
    /// Creates the verb with `FROM` registered.
    #[must_use]
    pub fn new() -> Self {
        let mut sub_verbs = VerbMap::new();
        sub_verbs.set_verb_processor("FROM", MailFromVerb);
        Self { sub_verbs }
    }
}

impl Default for MailVerb {
    fn default() -> Self {
        Self::new()
    }
}

impl Verb for MailVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(self.sub_verbs.dispatch_sub_verb(connection, command))
    }
}

/// `FROM <address> [PARAM=VALUE ...]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MailFromVerb;

impl Verb for MailFromVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            if connection.current_message().is_some() {
                return Err(Error::response(
                    ReplyCode::BAD_SEQUENCE,
                    "You already told me who the message was from",
                ));
            }
            if connection.behaviour().is_authentication_required()
                && !connection.session().authenticated
            {
                return Err(Error::response(
                    ReplyCode::AUTH_REQUIRED,
                    "Authentication required",
                ));
            }

            let Some((address, parameters)) = command.arguments().split_first() else {
                return Err(Error::response(
                    ReplyCode::PARAMETER_ERROR,
                    "Must specify from address or <>",
                ));
            };
            let from = strip_angle_brackets(address).to_string();

            connection.new_message();
            if let Err(error) = open_transaction(connection, &from, parameters) {
                connection.abort_message();
                return Err(error);
            }
            if let Some(message) = connection.current_message_mut() {
                message.set_from(from);
            }

            connection
                .write_response(&SmtpResponse::new(ReplyCode::OK, "Okey dokey"))
                .await?;
            Ok(Flow::Continue)
        })
    }
}

fn open_transaction(connection: &mut Connection, from: &str, parameters: &[String]) -> Result<()> {
    ParameterProcessorMap::process(connection, parameters)?;
    check_address_encoding(connection, from)?;
    connection.behaviour().on_message_start(from)
}

/// Removes one pair of enclosing angle brackets.
pub(crate) fn strip_angle_brackets(address: &str) -> &str {
    address
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(address)
}

/// Rejects non-ASCII addresses unless the open message is 8-bit.
pub(crate) fn check_address_encoding(connection: &Connection, address: &str) -> Result<()> {
    let eight_bit = connection
        .current_message()
        .is_some_and(crate::message::MessageBuilder::eight_bit_transport);
    if !address.is_ascii() && !eight_bit {
        return Err(Error::response(
            ReplyCode::PARAMETER_ERROR,
            "Non-ASCII address requires SMTPUTF8 or BODY=8BITMIME",
        ));
    }
    Ok(())
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

    #[test]
    fn strips_one_pair() {
        assert_eq!(strip_angle_brackets("<a@b.com>"), "a@b.com");
        assert_eq!(strip_angle_brackets("<>"), "");
        assert_eq!(
            strip_angle_brackets("<Robert Wood <rob@example.com>>"),
            "Robert Wood <rob@example.com>"
        );
        assert_eq!(strip_angle_brackets("a@b.com"), "a@b.com");
        assert_eq!(strip_angle_brackets("<a@b.com"), "<a@b.com");
    }
}
