//! The IMAP4rev1 command loop.
//!
//! The loop owns the connection state (not authenticated, authenticated,
//! selected) and turns each parsed command into one event on an
//! [`ImapEvents`] implementation. Syntax errors are answered with `BAD`,
//! commands issued in the wrong state with `BAD`, and handler failures
//! with `NO`; only transport failures end the session early.

use mailsink_core::LineChannel;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::events::{
    AppendEvent, CopyEvent, FetchEvent, ImapEvents, ListEvent, LoginEvent, MailboxEvent,
    NamespaceEvent, PollEvent, SearchEvent, SelectEvent, StatusEvent, StoreEvent, SubscribeEvent,
};
use crate::framed::read_command;
use crate::parser::{Command, CommandKind, CommandParser};
use crate::selected::SelectedMailbox;
use crate::types::Response;

/// Greeting sent on connect.
pub const GREETING: &str = "* OK smtp4dev IMAP4rev1 server ready";

/// Capabilities advertised by CAPABILITY.
pub const CAPABILITIES: &str = "IMAP4rev1 LITERAL+ NAMESPACE";

/// Connection state.
#[derive(Debug)]
enum State {
    NotAuthenticated,
    Authenticated,
    Selected(SelectedMailbox),
}

/// Whether the loop keeps reading.
enum Flow {
    Continue,
    Logout,
}

/// Runs one IMAP session to completion.
pub async fn run_session<H: ImapEvents>(mut channel: LineChannel, mut handler: H, client_address: &str) {
    info!(client = %client_address, "IMAP session started");

    if let Err(error) = serve(&mut channel, &mut handler).await {
        if error.is_transport() {
            debug!(client = %client_address, %error, "IMAP session ended by transport");
        } else {
            error!(client = %client_address, %error, "IMAP session failed");
        }
    }

    if let Err(error) = channel.shutdown().await {
        debug!(%error, "Shutdown after IMAP session failed");
    }
    info!(client = %client_address, "IMAP session completed");
}

async fn serve<H: ImapEvents>(channel: &mut LineChannel, handler: &mut H) -> Result<()> {
    channel.write_line(GREETING).await?;
    let mut state = State::NotAuthenticated;

    loop {
        let line = match read_command(channel).await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(Error::Protocol(message)) => {
                channel.write_line(&format!("* BYE {message}")).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let command = match CommandParser::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                let tag = CommandParser::tag(&line).unwrap_or_else(|| "*".to_string());
                debug!(%tag, error = %e, "Unparseable IMAP command");
                write_response(channel, &tag, &Response::bad(e.to_string())).await?;
                continue;
            }
        };

        debug!(tag = %command.tag, command = command.kind.name(), "IMAP command");
        let tag = command.tag.clone();
        let response = match dispatch(handler, &mut state, command).await {
            Ok((response, Flow::Logout)) => {
                write_response(channel, &tag, &response).await?;
                return Ok(());
            }
            Ok((response, Flow::Continue)) => response,
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                error!(%tag, error = %e, "IMAP event handler failed");
                Response::no("Internal server error")
            }
        };
        write_response(channel, &tag, &response).await?;
    }
}

async fn write_response(channel: &mut LineChannel, tag: &str, response: &Response) -> Result<()> {
    for line in &response.untagged {
        channel.write_all(line).await?;
        channel.write_all(b"\r\n").await?;
    }
    channel.write_line(&response.tagged_line(tag)).await?;
    Ok(())
}

fn wrong_state() -> Response {
    Response::bad("Command not valid in this state")
}

/// Raises the event for one command and applies any state change.
#[allow(clippy::too_many_lines)]
async fn dispatch<H: ImapEvents>(
    handler: &mut H,
    state: &mut State,
    command: Command,
) -> Result<(Response, Flow)> {
    let name = command.kind.name();
    let completed = || Response::ok(format!("{name} completed"));

    let response = match command.kind {
        CommandKind::Capability => {
            let mut response = completed();
            response.push_untagged(format!("CAPABILITY {CAPABILITIES}"));
            response
        }
        CommandKind::Logout => {
            let mut response = completed();
            response.push_untagged("BYE smtp4dev IMAP4rev1 server logging out");
            return Ok((response, Flow::Logout));
        }
        CommandKind::Noop | CommandKind::Check | CommandKind::Expunge => match state {
            State::Selected(selected) => {
                let mut event = PollEvent {
                    selected,
                    response: completed(),
                };
                handler.poll(&mut event).await?;
                event.response
            }
            _ if name == "NOOP" => completed(),
            _ => wrong_state(),
        },
        CommandKind::Login { username, password } => {
            if !matches!(state, State::NotAuthenticated) {
                return Ok((wrong_state(), Flow::Continue));
            }
            let mut event = LoginEvent {
                username,
                password,
                response: completed(),
            };
            handler.login(&mut event).await?;
            if event.response.status == crate::types::Status::Ok {
                *state = State::Authenticated;
            }
            event.response
        }
        _ if matches!(state, State::NotAuthenticated) => wrong_state(),
        CommandKind::Select { mailbox, read_only } => {
            let mut event = SelectEvent {
                mailbox,
                read_only,
                selected: None,
                response: completed(),
            };
            handler.select(&mut event).await?;
            *state = match event.selected.take() {
                Some(selected) => State::Selected(selected),
                None => State::Authenticated,
            };
            event.response
        }
        CommandKind::Create { mailbox } => {
            let mut event = MailboxEvent {
                mailbox,
                response: completed(),
            };
            handler.create(&mut event).await?;
            event.response
        }
        CommandKind::Delete { mailbox } => {
            let mut event = MailboxEvent {
                mailbox,
                response: completed(),
            };
            handler.delete(&mut event).await?;
            event.response
        }
        CommandKind::Subscribe { mailbox, subscribe } => {
            let mut event = SubscribeEvent {
                mailbox,
                subscribe,
                response: completed(),
            };
            handler.subscribe(&mut event).await?;
            event.response
        }
        CommandKind::List {
            reference,
            pattern,
            subscribed,
        } => {
            let mut event = ListEvent {
                reference,
                pattern,
                subscribed,
                response: completed(),
            };
            handler.list(&mut event).await?;
            event.response
        }
        CommandKind::Namespace => {
            let mut event = NamespaceEvent {
                response: completed(),
            };
            handler.namespace(&mut event).await?;
            event.response
        }
        CommandKind::Status { mailbox, items } => {
            let mut event = StatusEvent {
                mailbox,
                items,
                response: completed(),
            };
            handler.status(&mut event).await?;
            event.response
        }
        CommandKind::Append {
            mailbox,
            flags,
            data,
        } => {
            let mut event = AppendEvent {
                mailbox,
                flags,
                data,
                response: completed(),
            };
            handler.append(&mut event).await?;
            event.response
        }
        CommandKind::Close => {
            if !matches!(state, State::Selected(_)) {
                return Ok((wrong_state(), Flow::Continue));
            }
            *state = State::Authenticated;
            completed()
        }
        CommandKind::Search { criteria, uid } => {
            let State::Selected(selected) = state else {
                return Ok((wrong_state(), Flow::Continue));
            };
            let mut event = SearchEvent {
                selected,
                criteria: &criteria,
                uid,
                response: completed(),
            };
            handler.search(&mut event).await?;
            event.response
        }
        CommandKind::Fetch { set, items, uid } => {
            let State::Selected(selected) = state else {
                return Ok((wrong_state(), Flow::Continue));
            };
            let mut event = FetchEvent {
                selected,
                set,
                uid,
                items,
                response: completed(),
            };
            handler.fetch(&mut event).await?;
            event.response
        }
        CommandKind::Store {
            set,
            mode,
            silent,
            flags,
            uid,
        } => {
            let State::Selected(selected) = state else {
                return Ok((wrong_state(), Flow::Continue));
            };
            let mut event = StoreEvent {
                selected,
                set,
                uid,
                mode,
                silent,
                flags,
                response: completed(),
            };
            handler.store(&mut event).await?;
            event.response
        }
        CommandKind::Copy { set, mailbox, uid } => {
            let State::Selected(selected) = state else {
                return Ok((wrong_state(), Flow::Continue));
            };
            let mut event = CopyEvent {
                selected,
                set,
                uid,
                mailbox,
                response: completed(),
            };
            handler.copy(&mut event).await?;
            event.response
        }
    };

    Ok((response, Flow::Continue))
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
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    /// Accepts any login and refuses everything else.
    struct Permissive;

    impl ImapEvents for Permissive {
        async fn login(&mut self, event: &mut LoginEvent) -> Result<()> {
            event.response = Response::ok("LOGIN completed");
            Ok(())
        }
    }

    async fn transcript(input: &'static [u8]) -> String {
        let (server, mut client) = tokio::io::duplex(8192);
        let channel = LineChannel::new(server, Duration::from_secs(5), CancellationToken::new());

        let session = tokio::spawn(async move {
            run_session(channel, Permissive, "127.0.0.1:40002").await;
        });

        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        session.await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_greeting_capability_logout() {
        let out = transcript(b"a1 CAPABILITY\r\na2 LOGOUT\r\n").await;
        assert_eq!(
            out,
            "* OK smtp4dev IMAP4rev1 server ready\r\n\
             * CAPABILITY IMAP4rev1 LITERAL+ NAMESPACE\r\n\
             a1 OK CAPABILITY completed\r\n\
             * BYE smtp4dev IMAP4rev1 server logging out\r\n\
             a2 OK LOGOUT completed\r\n"
        );
    }

    mod state_tests {
        use super::*;

        #[tokio::test]
        async fn selected_commands_need_a_mailbox() {
            let out = transcript(b"a1 FETCH 1 FLAGS\r\na2 LOGIN rob pw\r\na3 FETCH 1 FLAGS\r\na4 LOGOUT\r\n").await;
            assert!(out.contains("a1 BAD Command not valid in this state\r\n"));
            assert!(out.contains("a2 OK LOGIN completed\r\n"));
            assert!(out.contains("a3 BAD Command not valid in this state\r\n"));
        }

        #[tokio::test]
        async fn defaults_answer_no() {
            let out = transcript(b"a1 LOGIN rob pw\r\na2 LIST \"\" *\r\na3 LOGOUT\r\n").await;
            assert!(out.contains("a2 NO LIST not supported\r\n"));
        }

        #[tokio::test]
        async fn second_login_is_refused() {
            let out = transcript(b"a1 LOGIN rob pw\r\na2 LOGIN rob pw\r\na3 LOGOUT\r\n").await;
            assert!(out.contains("a2 BAD Command not valid in this state\r\n"));
        }
    }

    mod syntax_tests {
        use super::*;

        #[tokio::test]
        async fn bad_commands_are_tagged() {
            let out = transcript(b"a1 FROBNICATE\r\n\r\na3 LOGOUT\r\n").await;
            assert!(out.contains("a1 BAD "));
            assert!(out.contains("* BAD "));
            assert!(out.contains("a3 OK LOGOUT completed\r\n"));
        }

        #[tokio::test]
        async fn disconnect_without_logout() {
            let out = transcript(b"a1 NOOP\r\n").await;
            assert!(out.ends_with("a1 OK NOOP completed\r\n"));
        }
    }
}
