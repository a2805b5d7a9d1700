//! SMTP AUTH mechanism processors.
//!
//! Each mechanism is a small state machine driven by
//! [`AuthMechanismProcessor::process_response`]. The AUTH verb feeds it the
//! initial response (if any) and then one decoded client line per
//! [`AuthProcessResult::Continue`] until it reports success or failure.

mod anonymous;
mod cram_md5;
mod credentials;
mod login;
mod plain;
mod xoauth2;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;

pub use anonymous::AnonymousMechanismProcessor;
pub use cram_md5::{CramMd5MechanismProcessor, cram_md5_digest};
pub use credentials::{AuthenticationCredentials, AuthenticationResult};
pub use login::LoginMechanismProcessor;
pub use plain::PlainMechanismProcessor;
pub use xoauth2::XOAuth2MechanismProcessor;

use crate::behaviour::ServerBehaviour;
use crate::types::AuthMechanism;

/// Step result of a mechanism exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProcessResult {
    /// Send `334 <challenge>` and feed the next client line back in.
    Continue(String),
    /// Credentials accepted.
    Success,
    /// Credentials rejected.
    Failed,
}

/// Mechanism failures that abort the exchange with `535`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Client data was not valid base64.
    #[error("Bad Base64 data")]
    BadBase64,
    /// Client data decoded but was malformed.
    #[error("{0}")]
    Failure(String),
}

/// A per-attempt mechanism state machine.
pub trait AuthMechanismProcessor: Send {
    /// Advances the exchange with the client's data.
    ///
    /// `None` means no data was sent (no initial response).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the client data is malformed.
    fn process_response(&mut self, data: Option<&str>) -> Result<AuthProcessResult, AuthError>;

    /// Returns the credentials once the exchange has produced them.
    fn credentials(&self) -> Option<&AuthenticationCredentials>;
}

/// Random-integer source used to build CRAM-MD5 challenges.
pub trait RandomSource: Send + Sync {
    /// Returns a value in `0..max`.
    fn next_int(&self, max: u32) -> u32;
}

/// Clock used to build CRAM-MD5 challenges.
pub trait Clock: Send + Sync {
    /// Returns a monotonically increasing tick count.
    fn ticks(&self) -> i64;
}

/// Thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_int(&self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..max)
    }
}

/// Wall clock in milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn ticks(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Collaborators a mechanism processor needs.
#[derive(Clone)]
pub struct AuthContext {
    /// Validates completed credentials.
    pub behaviour: Arc<dyn ServerBehaviour>,
    /// Challenge randomness.
    pub random: Arc<dyn RandomSource>,
    /// Challenge timestamp.
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("domain", &self.behaviour.domain_name())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    fn validate(&self, credentials: &AuthenticationCredentials) -> AuthProcessResult {
        match self.behaviour.validate_credentials(credentials) {
            AuthenticationResult::Success => AuthProcessResult::Success,
            AuthenticationResult::Failure => AuthProcessResult::Failed,
        }
    }
}

impl AuthMechanism {
    /// Creates a fresh processor for one AUTH attempt.
    #[must_use]
    pub fn create_processor(self, context: AuthContext) -> Box<dyn AuthMechanismProcessor> {
        match self {
            Self::CramMd5 => Box::new(CramMd5MechanismProcessor::new(context)),
            Self::Login => Box::new(LoginMechanismProcessor::new(context)),
            Self::Plain => Box::new(PlainMechanismProcessor::new(context)),
            Self::XOAuth2 => Box::new(XOAuth2MechanismProcessor::new(context)),
            Self::Anonymous => Box::new(AnonymousMechanismProcessor::new()),
        }
    }
}

pub(crate) fn decode_base64(data: &str) -> Result<String, AuthError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| AuthError::BadBase64)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(crate) fn encode_base64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::{AuthContext, AuthenticationCredentials, AuthenticationResult, Clock, RandomSource};
    use crate::behaviour::ServerBehaviour;

    pub struct FixedRandom(pub u32);

    impl RandomSource for FixedRandom {
        fn next_int(&self, _max: u32) -> u32 {
            self.0
        }
    }

    pub struct FixedClock(pub i64);

    impl Clock for FixedClock {
        fn ticks(&self) -> i64 {
            self.0
        }
    }

    /// Records validated credentials and answers with a fixed result.
    pub struct RecordingValidator {
        pub result: AuthenticationResult,
        pub seen: Mutex<Vec<AuthenticationCredentials>>,
    }

    impl ServerBehaviour for RecordingValidator {
        fn domain_name(&self) -> &str {
            "mockdomain"
        }

        fn validate_credentials(&self, credentials: &AuthenticationCredentials) -> AuthenticationResult {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(credentials.clone());
            }
            self.result
        }
    }

    pub fn context(result: AuthenticationResult) -> (AuthContext, Arc<RecordingValidator>) {
        let validator = Arc::new(RecordingValidator {
            result,
            seen: Mutex::new(Vec::new()),
        });
        let context = AuthContext {
            behaviour: validator.clone(),
            random: Arc::new(FixedRandom(1234)),
            clock: Arc::new(FixedClock(10000)),
        };
        (context, validator)
    }
}
