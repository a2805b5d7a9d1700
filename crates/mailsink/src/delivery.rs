//! Stores messages the SMTP server accepted.

use mailsink_core::{DEFAULT_MAILBOX, MessagesRepository, NewMessage, ServerOptions};
use mailsink_smtp::Message;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Mailboxes a message is delivered to.
///
/// With authentication required, a recipient whose address, or the local
/// part of it, names a configured user goes to that user's default mailbox.
/// Everything else lands in [`DEFAULT_MAILBOX`], which is also the only
/// mailbox POP3 and IMAP read while authentication is off. Each mailbox
/// receives at most one copy.
pub fn mailboxes_for(options: &ServerOptions, recipients: &[String]) -> Vec<String> {
    if !options.authentication_required {
        return vec![DEFAULT_MAILBOX.to_string()];
    }

    let mut mailboxes: Vec<String> = Vec::new();
    for recipient in recipients {
        let local_part = recipient.split('@').next().unwrap_or(recipient);
        let mailbox = options
            .find_user(recipient)
            .or_else(|| options.find_user(local_part))
            .map(|user| options.mailbox_for_user(Some(&user.username)))
            .unwrap_or_else(|| DEFAULT_MAILBOX.to_string());
        if !mailboxes.contains(&mailbox) {
            mailboxes.push(mailbox);
        }
    }
    if mailboxes.is_empty() {
        mailboxes.push(DEFAULT_MAILBOX.to_string());
    }
    mailboxes
}

/// Persists one message into every mailbox it is addressed to.
///
/// # Errors
///
/// Returns the first repository failure.
pub async fn deliver<R: MessagesRepository>(
    repository: &R,
    options: &ServerOptions,
    message: Message,
) -> mailsink_core::Result<()> {
    for mailbox in mailboxes_for(options, &message.recipients) {
        let record = NewMessage::from_envelope(
            message.from.clone(),
            message.recipients.clone(),
            message.data.clone(),
            message.secure_connection,
        );
        let stored = repository.add_message(&mailbox, None, record).await?;
        info!(id = stored.id, %mailbox, from = %stored.from, subject = %stored.subject, "Message stored");
    }
    Ok(())
}

/// Drains the SMTP message channel until every sender is gone.
pub async fn run<R: MessagesRepository>(
    repository: R,
    options: &ServerOptions,
    mut messages: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = messages.recv().await {
        if let Err(e) = deliver(&repository, options, message).await {
            error!(error = %e, "Failed to store message");
        }
    }
    debug!("Message channel closed");
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
    use std::sync::Arc;

    use mailsink_core::{SqliteRepository, UserOptions};
    use mailsink_pop3::{CommandMap, Pop3SessionContext, run_session};
    use mailsink_smtp::MessageBuilder;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio_util::sync::CancellationToken;

    fn options() -> ServerOptions {
        ServerOptions {
            authentication_required: true,
            users: vec![UserOptions {
                username: "rob".to_string(),
                password: "secret".to_string(),
                default_mailbox: Some("Rob".to_string()),
            }],
            ..ServerOptions::default()
        }
    }

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    mod routing_tests {
        use super::*;

        #[test]
        fn unknown_recipients_use_default() {
            assert_eq!(
                mailboxes_for(&options(), &recipients(&["x@example.com", "y@example.com"])),
                vec![DEFAULT_MAILBOX]
            );
        }

        #[test]
        fn user_by_local_part() {
            assert_eq!(
                mailboxes_for(&options(), &recipients(&["Rob@example.com", "x@example.com"])),
                vec!["Rob", DEFAULT_MAILBOX]
            );
        }

        #[test]
        fn no_recipients() {
            assert_eq!(mailboxes_for(&options(), &[]), vec![DEFAULT_MAILBOX]);
        }

        #[test]
        fn users_share_default_without_auth() {
            let options = ServerOptions {
                authentication_required: false,
                ..options()
            };
            assert_eq!(
                mailboxes_for(&options, &recipients(&["rob@example.com", "x@example.com"])),
                vec![DEFAULT_MAILBOX]
            );
        }
    }

    fn status_message(recipient: &str) -> Message {
        let mut builder = MessageBuilder::new(true);
        builder.set_from("alice@example.com");
        builder.add_recipient(recipient);
        builder.write(b"Subject: Status\r\n\r\nAll good\r\n");
        builder.finish()
    }

    #[tokio::test]
    async fn channel_messages_are_stored() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(status_message("rob@example.com")).unwrap();
        drop(sender);

        run(repository.clone(), &options(), receiver).await;

        let stored = repository.get_messages("Rob", None, false).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].from, "alice@example.com");
        assert_eq!(stored[0].subject, "Status");
        assert!(stored[0].secure_connection);
        assert!(repository.get_messages(DEFAULT_MAILBOX, None, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_mail_reaches_pop3_without_auth() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let options = ServerOptions {
            authentication_required: false,
            ..options()
        };
        let message = status_message("rob@example.com");
        let size = message.data.len();
        deliver(&repository, &options, message).await.unwrap();

        let (server, client) = tokio::io::duplex(16 * 1024);
        let context = Pop3SessionContext::new(
            server,
            Arc::new(options),
            repository,
            None,
            "127.0.0.1:40110",
            CancellationToken::new(),
        );
        let session = tokio::spawn(async move {
            run_session(context, &CommandMap::standard()).await;
        });

        let (read, mut writer) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("+OK"));
        let mut replies = Vec::new();
        for command in ["USER rob", "PASS secret", "STAT", "QUIT"] {
            writer.write_all(format!("{command}\r\n").as_bytes()).await.unwrap();
            replies.push(lines.next_line().await.unwrap().unwrap());
        }
        session.await.unwrap();

        assert!(replies[1].starts_with("+OK"));
        assert_eq!(replies[2], format!("+OK 1 {size}"));
    }
}
