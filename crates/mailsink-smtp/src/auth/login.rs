//! LOGIN mechanism.

use super::{
    AuthContext, AuthError, AuthMechanismProcessor, AuthProcessResult, AuthenticationCredentials,
    decode_base64, encode_base64,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Initial,
    WaitingForUsername,
    WaitingForPassword(String),
    Completed,
}

/// LOGIN exchange: `Username:` prompt, `Password:` prompt, validate.
#[derive(Debug)]
pub struct LoginMechanismProcessor {
    context: AuthContext,
    state: State,
    credentials: Option<AuthenticationCredentials>,
}

impl LoginMechanismProcessor {
    /// Creates a processor in its initial state.
    #[must_use]
    pub const fn new(context: AuthContext) -> Self {
        Self {
            context,
            state: State::Initial,
            credentials: None,
        }
    }

    fn prompt_password(&mut self, username: String) -> AuthProcessResult {
        self.state = State::WaitingForPassword(username);
        AuthProcessResult::Continue(encode_base64("Password:"))
    }
}

impl AuthMechanismProcessor for LoginMechanismProcessor {
    fn process_response(&mut self, data: Option<&str>) -> Result<AuthProcessResult, AuthError> {
        match std::mem::replace(&mut self.state, State::Completed) {
            State::Initial => match data.filter(|d| !d.trim().is_empty()) {
                // AUTH LOGIN <username> skips the first prompt.
                Some(initial) => {
                    let username = decode_base64(initial)?;
                    Ok(self.prompt_password(username))
                }
                None => {
                    self.state = State::WaitingForUsername;
                    Ok(AuthProcessResult::Continue(encode_base64("Username:")))
                }
            },
            State::WaitingForUsername => {
                let username = decode_base64(data.unwrap_or_default())?;
                Ok(self.prompt_password(username))
            }
            State::WaitingForPassword(username) => {
                let password = decode_base64(data.unwrap_or_default())?;
                let credentials = AuthenticationCredentials::UsernameAndPassword { username, password };
                let result = self.context.validate(&credentials);
                self.credentials = Some(credentials);
                Ok(result)
            }
            State::Completed => Err(AuthError::Failure(
                "Authentication exchange already completed".to_string(),
            )),
        }
    }

    fn credentials(&self) -> Option<&AuthenticationCredentials> {
        self.credentials.as_ref()
    }
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
    use crate::auth::AuthenticationResult;
    use crate::auth::test_support::context;

    #[test]
    fn test_full_exchange() {
        let (ctx, validator) = context(AuthenticationResult::Success);
        let mut processor = LoginMechanismProcessor::new(ctx);

        assert_eq!(
            processor.process_response(None).unwrap(),
            AuthProcessResult::Continue("VXNlcm5hbWU6".to_string())
        );
        assert_eq!(
            processor
                .process_response(Some(&encode_base64("rob")))
                .unwrap(),
            AuthProcessResult::Continue("UGFzc3dvcmQ6".to_string())
        );
        assert_eq!(
            processor
                .process_response(Some(&encode_base64("secret")))
                .unwrap(),
            AuthProcessResult::Success
        );

        let expected = AuthenticationCredentials::UsernameAndPassword {
            username: "rob".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(processor.credentials(), Some(&expected));
        assert_eq!(validator.seen.lock().unwrap()[0], expected);
    }

    #[test]
    fn test_initial_response_skips_username_prompt() {
        let (ctx, _) = context(AuthenticationResult::Failure);
        let mut processor = LoginMechanismProcessor::new(ctx);

        assert_eq!(
            processor
                .process_response(Some(&encode_base64("rob")))
                .unwrap(),
            AuthProcessResult::Continue("UGFzc3dvcmQ6".to_string())
        );
        assert_eq!(
            processor
                .process_response(Some(&encode_base64("wrong")))
                .unwrap(),
            AuthProcessResult::Failed
        );
    }

    #[test]
    fn test_bad_base64_username() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = LoginMechanismProcessor::new(ctx);
        processor.process_response(None).unwrap();
        assert_eq!(
            processor.process_response(Some("@@@")).unwrap_err(),
            AuthError::BadBase64
        );
    }
}
