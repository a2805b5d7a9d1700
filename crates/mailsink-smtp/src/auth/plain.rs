//! PLAIN mechanism (RFC 4616).

use super::{
    AuthContext, AuthError, AuthMechanismProcessor, AuthProcessResult, AuthenticationCredentials,
    decode_base64,
};

/// PLAIN exchange: one `authzid NUL authcid NUL password` message.
#[derive(Debug)]
pub struct PlainMechanismProcessor {
    context: AuthContext,
    credentials: Option<AuthenticationCredentials>,
}

impl PlainMechanismProcessor {
    /// Creates a processor awaiting the client message.
    #[must_use]
    pub const fn new(context: AuthContext) -> Self {
        Self {
            context,
            credentials: None,
        }
    }
}

impl AuthMechanismProcessor for PlainMechanismProcessor {
    fn process_response(&mut self, data: Option<&str>) -> Result<AuthProcessResult, AuthError> {
        let Some(data) = data.filter(|d| !d.trim().is_empty()) else {
            return Ok(AuthProcessResult::Continue(String::new()));
        };

        let decoded = decode_base64(data)?;
        let parts: Vec<&str> = decoded.split('\0').collect();
        let [authzid, username, password] = parts.as_slice() else {
            return Err(AuthError::Failure(
                "Auth data in incorrect format".to_string(),
            ));
        };

        let credentials = AuthenticationCredentials::Plain {
            authzid: (*authzid).to_string(),
            username: (*username).to_string(),
            password: (*password).to_string(),
        };
        let result = self.context.validate(&credentials);
        self.credentials = Some(credentials);
        Ok(result)
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
    use crate::auth::encode_base64;
    use crate::auth::test_support::context;

    #[test]
    fn test_no_initial_response_continues() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = PlainMechanismProcessor::new(ctx);
        assert_eq!(
            processor.process_response(None).unwrap(),
            AuthProcessResult::Continue(String::new())
        );
    }

    #[test]
    fn test_valid_message() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = PlainMechanismProcessor::new(ctx);
        let result = processor
            .process_response(Some(&encode_base64("\0rob\0secret")))
            .unwrap();
        assert_eq!(result, AuthProcessResult::Success);
        assert_eq!(processor.credentials().unwrap().username(), Some("rob"));
    }

    #[test]
    fn test_wrong_field_count() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = PlainMechanismProcessor::new(ctx);
        let err = processor
            .process_response(Some(&encode_base64("rob\0secret")))
            .unwrap_err();
        assert!(matches!(err, AuthError::Failure(_)));
        assert!(processor.credentials().is_none());
    }
}
