//! `AUTH` (RFC 4954).

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{
    AuthContext, AuthProcessResult, Clock, RandomSource, SystemClock, ThreadRandom,
};
use crate::command::SmtpCommand;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::parameters::ParameterProcessor;
use crate::types::{AuthMechanism, ReplyCode, SmtpResponse};
use crate::verbs::{Flow, Verb, VerbFuture};

use super::{Extension, ExtensionProcessor};

/// Registers the AUTH verb and the `AUTH=` MAIL FROM parameter.
///
/// The random source and clock are handed to every mechanism processor so
/// CRAM-MD5 challenges can be made deterministic.
#[derive(Clone)]
pub struct AuthExtension {
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthExtension").finish_non_exhaustive()
    }
}

impl Default for AuthExtension {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRandom), Arc::new(SystemClock))
    }
}

impl AuthExtension {
    /// Creates the extension with explicit challenge sources.
    #[must_use]
    pub fn new(random: Arc<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self { random, clock }
    }
}

impl Extension for AuthExtension {
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor> {
        connection.verb_map_mut().set_verb_processor(
            "AUTH",
            AuthVerb {
                random: Arc::clone(&self.random),
                clock: Arc::clone(&self.clock),
            },
        );
        connection
            .mail_parameters_mut()
            .set_processor("AUTH", AuthParameter);
        Box::new(AuthProcessor)
    }
}

struct AuthProcessor;

impl ExtensionProcessor for AuthProcessor {
    fn ehlo_keywords(&self, connection: &Connection) -> Vec<String> {
        let secure = connection.is_secure();
        let enabled: Vec<&str> = AuthMechanism::ALL
            .iter()
            .filter(|mechanism| {
                connection
                    .behaviour()
                    .is_auth_mechanism_enabled(**mechanism, secure)
            })
            .map(|mechanism| mechanism.as_str())
            .collect();
        let registered: Vec<&str> = AuthMechanism::ALL
            .iter()
            .map(|mechanism| mechanism.as_str())
            .collect();

        let mut keywords = Vec::with_capacity(2);
        if !enabled.is_empty() {
            keywords.push(format!("AUTH={}", enabled.join(" ")));
        }
        keywords.push(format!("AUTH {}", registered.join(" ")));
        keywords
    }
}

/// `AUTH=<mailbox>` on MAIL FROM; any non-empty value is accepted.
struct AuthParameter;

impl ParameterProcessor for AuthParameter {
    fn set_parameter(&self, _connection: &mut Connection, _key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(Error::response(
                ReplyCode::PARAMETER_ERROR,
                "AUTH parameter requires a value",
            ));
        }
        Ok(())
    }
}

/// `AUTH <mechanism> [initial-response]`.
pub struct AuthVerb {
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerb").finish_non_exhaustive()
    }
}

impl AuthVerb {
    fn select_mechanism(connection: &Connection, command: &SmtpCommand) -> Result<AuthMechanism> {
        if connection.session().authenticated {
            return Err(Error::response(
                ReplyCode::BAD_SEQUENCE,
                "Already authenticated",
            ));
        }

        let name = command.arguments().first().ok_or_else(|| {
            Error::response(
                ReplyCode::PARAMETER_ERROR,
                "Must specify AUTH mechanism as a parameter",
            )
        })?;
        let mechanism = AuthMechanism::parse(name).ok_or_else(|| {
            Error::response(
                ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                "Specified AUTH mechanism not supported",
            )
        })?;

        if !connection
            .behaviour()
            .is_auth_mechanism_enabled(mechanism, connection.is_secure())
        {
            return Err(Error::response(
                ReplyCode::ENCRYPTION_REQUIRED,
                "Specified AUTH mechanism not allowed right now (might require secure connection etc)",
            ));
        }
        Ok(mechanism)
    }
}

impl Verb for AuthVerb {
    fn process<'a>(&'a self, connection: &'a mut Connection, command: &'a SmtpCommand) -> VerbFuture<'a> {
        Box::pin(async move {
            let mechanism = Self::select_mechanism(connection, command)?;
            let context = AuthContext {
                behaviour: Arc::clone(connection.behaviour()),
                random: Arc::clone(&self.random),
                clock: Arc::clone(&self.clock),
            };
            let mut processor = mechanism.create_processor(context);

            let mut data = command
                .arguments()
                .get(1)
                .map(|initial| if initial == "=" { String::new() } else { initial.clone() });

            loop {
                let result = processor.process_response(data.as_deref()).map_err(|error| {
                    warn!(%mechanism, %error, "AUTH exchange rejected");
                    Error::response(ReplyCode::AUTH_FAILED, error.to_string())
                })?;

                match result {
                    AuthProcessResult::Continue(challenge) => {
                        connection
                            .write_response(&SmtpResponse::new(ReplyCode::AUTH_CONTINUE, challenge))
                            .await?;
                        let line = connection.read_text_line().await?;
                        if line.trim() == "*" {
                            return Err(Error::response(
                                ReplyCode::PARAMETER_ERROR,
                                "Authentication aborted",
                            ));
                        }
                        data = Some(line);
                    }
                    AuthProcessResult::Success => {
                        let credentials = processor.credentials().cloned();
                        info!(
                            %mechanism,
                            user = credentials.as_ref().and_then(|c| c.username()).unwrap_or(""),
                            "AUTH succeeded"
                        );
                        let session = connection.session_mut();
                        session.authenticated = true;
                        session.credentials = credentials;
                        connection
                            .write_response(&SmtpResponse::new(
                                ReplyCode::AUTH_SUCCEEDED,
                                "Authenticated OK",
                            ))
                            .await?;
                        return Ok(Flow::Continue);
                    }
                    AuthProcessResult::Failed => {
                        info!(%mechanism, "AUTH failed");
                        connection
                            .write_response(&SmtpResponse::new(
                                ReplyCode::AUTH_FAILED,
                                "Authentication failure",
                            ))
                            .await?;
                        return Ok(Flow::Continue);
                    }
                }
            }
        })
    }
}
