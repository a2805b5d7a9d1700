//! SMTP connection state machine.
//!
//! A [`Connection`] owns the line channel, the [`Session`] record, the open
//! message (if any) and the per-connection extension processors. It reads
//! one command at a time, dispatches it through the [`VerbMap`] and writes
//! the result. Protocol errors become responses; everything else ends the
//! session and is recorded on it.

use std::sync::Arc;

use chrono::Utc;
use mailsink_core::{AsyncStream, LineChannel};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::behaviour::ServerBehaviour;
use crate::command::SmtpCommand;
use crate::error::{Error, Result};
use crate::extensions::ExtensionProcessor;
use crate::message::{Message, MessageBuilder};
use crate::parameters::ParameterProcessorMap;
use crate::session::{Session, SessionErrorKind};
use crate::types::{ReplyCode, SmtpResponse};
use crate::verbs::{Flow, VerbMap};

/// One accepted SMTP connection.
pub struct Connection {
    channel: LineChannel,
    behaviour: Arc<dyn ServerBehaviour>,
    session: Session,
    verb_map: VerbMap,
    mail_parameters: ParameterProcessorMap,
    current_message: Option<MessageBuilder>,
    extension_processors: Vec<Box<dyn ExtensionProcessor>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("client", &self.session.client_address)
            .field("verbs", &self.verb_map)
            .field("mail_parameters", &self.mail_parameters)
            .field("message_open", &self.current_message.is_some())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps an accepted stream and instantiates the behaviour's extensions.
    pub fn new(
        stream: impl AsyncStream + 'static,
        behaviour: Arc<dyn ServerBehaviour>,
        client_address: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        let channel = LineChannel::new(stream, behaviour.receive_timeout(), cancel);
        let mut connection = Self {
            channel,
            session: Session::new(client_address),
            verb_map: VerbMap::standard(),
            mail_parameters: ParameterProcessorMap::new(),
            current_message: None,
            extension_processors: Vec::new(),
            behaviour,
        };

        for extension in connection.behaviour.extensions() {
            let processor = extension.create_processor(&mut connection);
            connection.extension_processors.push(processor);
        }
        connection
    }

    /// Returns the server behaviour.
    #[must_use]
    pub fn behaviour(&self) -> &Arc<dyn ServerBehaviour> {
        &self.behaviour
    }

    /// Returns the session record.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session record for mutation.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the verb map for registration.
    pub const fn verb_map_mut(&mut self) -> &mut VerbMap {
        &mut self.verb_map
    }

    /// Returns the MAIL FROM parameter processors.
    #[must_use]
    pub const fn mail_parameters(&self) -> &ParameterProcessorMap {
        &self.mail_parameters
    }

    /// Returns the MAIL FROM parameter processors for registration.
    pub const fn mail_parameters_mut(&mut self) -> &mut ParameterProcessorMap {
        &mut self.mail_parameters
    }

    /// Returns the active extension processors.
    #[must_use]
    pub fn extension_processors(&self) -> &[Box<dyn ExtensionProcessor>] {
        &self.extension_processors
    }

    /// Returns the open message, if any.
    #[must_use]
    pub const fn current_message(&self) -> Option<&MessageBuilder> {
        self.current_message.as_ref()
    }

    /// Returns the open message for mutation.
    pub const fn current_message_mut(&mut self) -> Option<&mut MessageBuilder> {
        self.current_message.as_mut()
    }

    /// Opens a new message transaction, replacing any open one.
    pub fn new_message(&mut self) -> &mut MessageBuilder {
        self.current_message
            .insert(MessageBuilder::new(self.session.secure_connection))
    }

    /// Detaches the open message so its data can be written.
    pub const fn take_message(&mut self) -> Option<MessageBuilder> {
        self.current_message.take()
    }

    /// Discards the open message.
    pub fn abort_message(&mut self) {
        if self.current_message.take().is_some() {
            debug!(client = %self.session.client_address, "Message aborted");
        }
    }

    /// Records a completed message and hands it to the behaviour.
    pub fn commit_message(&mut self, message: Message) {
        info!(
            client = %self.session.client_address,
            from = %message.from,
            recipients = message.recipients.len(),
            size = message.data.len(),
            "Message committed"
        );
        self.behaviour.on_message_received(&message);
        self.session.add_message(message);
    }

    /// Returns true once the transport is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.channel.is_secure()
    }

    /// Reads one raw line, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] at end of stream, or the transport
    /// error.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let line = self.channel.read_line().await?.ok_or(Error::ConnectionClosed)?;
        self.session
            .append_to_log(format!("<<{}", String::from_utf8_lossy(&line)));
        Ok(line)
    }

    /// Reads one line and decodes it lossily as UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`read_line`](Self::read_line).
    pub async fn read_text_line(&mut self) -> Result<String> {
        let line = self.read_line().await?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Writes a possibly multi-line response.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn write_response(&mut self, response: &SmtpResponse) -> Result<()> {
        for line in response.wire_lines() {
            self.session.append_to_log(format!(">>{line}"));
            self.channel.write_line(&line).await?;
        }
        Ok(())
    }

    /// Performs the server-side TLS handshake on the current stream.
    ///
    /// The client must greet again afterwards and any open message is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without a certificate, or the handshake
    /// error.
    pub async fn upgrade_to_tls(&mut self) -> Result<()> {
        let acceptor = self
            .behaviour
            .tls_acceptor()
            .ok_or_else(|| Error::Config("no TLS certificate configured".into()))?;
        self.channel.upgrade_to_tls(&acceptor).await?;

        debug!(client = %self.session.client_address, "SMTP TLS established");
        self.session.secure_connection = true;
        self.session.client_name = None;
        self.abort_message();
        Ok(())
    }

    /// Runs the session to completion and returns its record.
    pub async fn process(mut self) -> Session {
        debug!(client = %self.session.client_address, "SMTP session started");
        self.behaviour.on_session_started(&self.session);

        if let Err(error) = self.run().await {
            let kind = if error.is_network() {
                SessionErrorKind::NetworkError
            } else {
                SessionErrorKind::UnexpectedError
            };
            warn!(
                client = %self.session.client_address,
                ?kind,
                error = %error,
                "SMTP session ended with error"
            );
            self.session.session_error = Some(error.to_string());
            self.session.session_error_kind = Some(kind);
        }

        if let Err(error) = self.channel.shutdown().await {
            debug!(error = %error, "Shutdown after SMTP session failed");
        }
        self.session.end_date = Some(Utc::now());
        self.behaviour.on_session_completed(&self.session);
        self.session
    }

    async fn run(&mut self) -> Result<()> {
        if self.behaviour.is_implicit_tls() {
            self.upgrade_to_tls().await?;
        }

        let greeting = SmtpResponse::new(
            ReplyCode::SERVICE_READY,
            format!("{} smtp4dev ready", self.behaviour.domain_name()),
        );
        self.write_response(&greeting).await?;

        let mut bad_commands = 0u32;
        loop {
            let line = match self.read_text_line().await {
                Ok(line) => line,
                Err(error) if error.is_line_too_long() => {
                    self.write_response(&line_too_long()).await?;
                    continue;
                }
                Err(error) => return Err(error),
            };
            let command = SmtpCommand::parse(&line);
            self.behaviour.on_command_received(&command);
            if command.is_empty() {
                continue;
            }

            let processor = command
                .is_valid()
                .then(|| self.verb_map.get_verb_processor(command.verb()))
                .flatten();
            let Some(processor) = processor else {
                bad_commands += 1;
                let limit = self.behaviour.maximum_sequential_bad_commands();
                if limit > 0 && bad_commands >= limit {
                    let bye = SmtpResponse::new(ReplyCode::CLOSING, "Too many bad commands. Bye!");
                    self.write_response(&bye).await?;
                    return Ok(());
                }
                let unrecognised =
                    SmtpResponse::new(ReplyCode::SYNTAX_ERROR, "Command unrecognised");
                self.write_response(&unrecognised).await?;
                continue;
            };
            bad_commands = 0;

            match processor.process(self, &command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => return Ok(()),
                Err(Error::Response(response)) => self.write_response(&response).await?,
                Err(error) if error.is_line_too_long() => {
                    self.write_response(&line_too_long()).await?;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn line_too_long() -> SmtpResponse {
    SmtpResponse::new(ReplyCode::SYNTAX_ERROR, "Line too long")
}
