//! Maildrop commands: STAT, LIST, UIDL, RETR, TOP, DELE, RSET and NOOP.
//!
//! Message numbers are 1-based positions in repository order, re-read on
//! every command.

use mailsink_core::{MessagesRepository, StoredMessage};
use tracing::debug;

use crate::codec;
use crate::context::Pop3SessionContext;
use crate::error::Result;

use super::{CommandHandler, HandlerFuture, Pop3Outcome, reject, resolve_message};

/// Writes `-ERR` and returns false unless PASS has succeeded.
async fn require_authentication<R: MessagesRepository>(
    context: &mut Pop3SessionContext<R>,
) -> Result<bool> {
    if context.is_authenticated() {
        return Ok(true);
    }
    reject(context, "Not authenticated").await?;
    Ok(false)
}

/// Shared body of LIST and UIDL: one message or the whole scan listing.
async fn scan_listing<R: MessagesRepository>(
    context: &mut Pop3SessionContext<R>,
    argument: Option<&str>,
    describe: fn(&StoredMessage) -> String,
) -> Result<Pop3Outcome> {
    if !require_authentication(context).await? {
        return Ok(Pop3Outcome::Continue);
    }

    if let Some(index) = argument.map(str::trim).filter(|a| !a.is_empty()) {
        if let Some(message) = resolve_message(context, Some(index)).await? {
            context
                .write_line(&format!("+OK {index} {}", describe(&message)))
                .await?;
        }
        return Ok(Pop3Outcome::Continue);
    }

    let messages = context.messages().await?;
    context
        .write_line(&format!("+OK {} messages", messages.len()))
        .await?;
    for (i, message) in messages.iter().enumerate() {
        context
            .write_line(&format!("{} {}", i + 1, describe(message)))
            .await?;
    }
    context.write_line(".").await?;
    Ok(Pop3Outcome::Continue)
}

/// `STAT`: message count and total size.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatCommand;

impl<R: MessagesRepository> CommandHandler<R> for StatCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !require_authentication(context).await? {
                return Ok(Pop3Outcome::Continue);
            }
            let messages = context.messages().await?;
            let total: usize = messages.iter().map(StoredMessage::size).sum();
            context
                .write_line(&format!("+OK {} {total}", messages.len()))
                .await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `LIST [n]`: sizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListCommand;

impl<R: MessagesRepository> CommandHandler<R> for ListCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(scan_listing(context, argument, |m| m.size().to_string()))
    }
}

/// `UIDL [n]`: unique ids derived from repository id and size.
#[derive(Debug, Default, Clone, Copy)]
pub struct UidlCommand;

impl<R: MessagesRepository> CommandHandler<R> for UidlCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(scan_listing(context, argument, StoredMessage::unique_id))
    }
}

/// `RETR n`: the whole message, dot-stuffed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetrCommand;

impl<R: MessagesRepository> CommandHandler<R> for RetrCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !require_authentication(context).await? {
                return Ok(Pop3Outcome::Continue);
            }
            let Some(message) = resolve_message(context, argument).await? else {
                return Ok(Pop3Outcome::Continue);
            };

            context
                .write_line(&format!("+OK {} octets", message.size()))
                .await?;
            context.write_dot_stuffed(&message.data).await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `TOP n lines`: headers plus the first body lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopCommand;

impl<R: MessagesRepository> CommandHandler<R> for TopCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !require_authentication(context).await? {
                return Ok(Pop3Outcome::Continue);
            }
            let Some(lines) = argument
                .and_then(|a| a.split_whitespace().nth(1))
                .and_then(|n| n.parse::<usize>().ok())
            else {
                return reject(context, "Usage: TOP msg n").await;
            };
            let Some(message) = resolve_message(context, argument).await? else {
                return Ok(Pop3Outcome::Continue);
            };

            context.write_line("+OK Top of message follows").await?;
            context
                .write_dot_stuffed(&codec::message_top(&message.data, lines))
                .await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `DELE n`: deletes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleCommand;

impl<R: MessagesRepository> CommandHandler<R> for DeleCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !require_authentication(context).await? {
                return Ok(Pop3Outcome::Continue);
            }
            let Some(message) = resolve_message(context, argument).await? else {
                return Ok(Pop3Outcome::Continue);
            };

            context.repository().delete_message(message.id).await?;
            debug!(id = message.id, "POP3 deleted message");
            context.write_line("+OK Message deleted").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `RSET`: nothing to roll back since deletions are immediate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsetCommand;

impl<R: MessagesRepository> CommandHandler<R> for RsetCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            context.write_line("+OK").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `NOOP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCommand;

impl<R: MessagesRepository> CommandHandler<R> for NoopCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        _argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            context.write_line("+OK").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}
