//! DATA: reads the dot-terminated message body.

use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::MessageBuilder;
use crate::types::{ReplyCode, SmtpResponse};

use super::{Flow, Verb, VerbFuture};

/// `DATA`.
///
/// Lines are read until one that is exactly `.`. A single leading dot is
/// removed from every other line and lines are joined with CRLF. A body
/// larger than the behaviour's maximum, or holding a line over the channel
/// limit, is consumed in full and then rejected with `552`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataVerb;

impl Verb for DataVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, _command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            let Some(mut message) = connection.take_message() else {
                return Err(Error::response(
                    ReplyCode::BAD_SEQUENCE,
                    "Bad sequence of commands",
                ));
            };

            connection
                .write_response(&SmtpResponse::new(
                    ReplyCode::START_DATA,
                    "End message with period",
                ))
                .await?;

            let limit = connection.behaviour().maximum_message_size();
            if !read_body(connection, &mut message, limit).await? {
                return Err(Error::response(
                    ReplyCode::EXCEEDED_STORAGE,
                    "Message exceeds fixed size limit",
                ));
            }

            connection.commit_message(message.finish());
            connection
                .write_response(&SmtpResponse::new(ReplyCode::OK, "Mail accepted"))
                .await?;
            Ok(Flow::Continue)
        })
    }
}

/// Streams the body into `message`; returns false if it exceeded `limit`.
async fn read_body(
    connection: &mut Connection,
    message: &mut MessageBuilder,
    limit: Option<u64>,
) -> Result<bool> {
    let mut within_limit = true;
    let mut first = true;

    loop {
        let line = match connection.read_line().await {
            Ok(line) => line,
            Err(error) if error.is_line_too_long() => {
                within_limit = false;
                continue;
            }
            Err(error) => return Err(error),
        };
        if line == b"." {
            return Ok(within_limit);
        }
        if !within_limit {
            continue;
        }

        let unstuffed = line.strip_prefix(b".").unwrap_or(&line);
        if !first {
            message.write(b"\r\n");
        }
        message.write(unstuffed);
        first = false;

        let written = u64::try_from(message.data_len()).unwrap_or(u64::MAX);
        if limit.is_some_and(|max| written > max) {
            within_limit = false;
        }
    }
}
