//! USER and PASS.

use mailsink_core::MessagesRepository;
use tracing::info;

use crate::context::Pop3SessionContext;

use super::{CommandHandler, HandlerFuture, Pop3Outcome, reject};

/// `USER name`: records the name for the following PASS.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserCommand;

impl<R: MessagesRepository> CommandHandler<R> for UserCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let Some(username) = argument.map(str::trim).filter(|u| !u.is_empty()) else {
                return reject(context, "Missing username").await;
            };
            context.set_username(username);
            context.write_line("+OK User accepted").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}

/// `PASS secret`.
///
/// Any non-empty password is accepted unless the server requires
/// authentication, in which case it is checked against the configured
/// users.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassCommand;

impl<R: MessagesRepository> CommandHandler<R> for PassCommand {
    fn execute<'a>(
        &'a self,
        context: &'a mut Pop3SessionContext<R>,
        argument: Option<&'a str>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            if context.is_authenticated() {
                return reject(context, "Already authenticated").await;
            }
            let Some(username) = context.username().map(str::to_string) else {
                return reject(context, "Send USER first").await;
            };
            let Some(password) = argument.filter(|p| !p.is_empty()) else {
                return reject(context, "Missing password").await;
            };

            let options = context.options();
            if options.authentication_required && !options.check_password(&username, password) {
                info!(client = %context.client_address(), %username, "POP3 login rejected");
                return reject(context, "Authentication failed").await;
            }

            context.authenticate();
            info!(client = %context.client_address(), %username, "POP3 login");
            context.write_line("+OK Authenticated").await?;
            Ok(Pop3Outcome::Continue)
        })
    }
}
