//! XOAUTH2 mechanism.

use super::{
    AuthContext, AuthError, AuthMechanismProcessor, AuthProcessResult, AuthenticationCredentials,
    decode_base64,
};

/// XOAUTH2 exchange: one `user=<u>^Aauth=Bearer <token>^A^A` message.
#[derive(Debug)]
pub struct XOAuth2MechanismProcessor {
    context: AuthContext,
    credentials: Option<AuthenticationCredentials>,
}

impl XOAuth2MechanismProcessor {
    /// Creates a processor awaiting the client message.
    #[must_use]
    pub const fn new(context: AuthContext) -> Self {
        Self {
            context,
            credentials: None,
        }
    }
}

/// Splits an XOAUTH2 payload into username and bearer token.
fn parse_payload(payload: &str) -> Option<(String, String)> {
    let mut username = None;
    let mut token = None;

    for field in payload.split('\x01') {
        if let Some(user) = field.strip_prefix("user=") {
            username = Some(user.trim());
        } else if let Some(auth) = field.strip_prefix("auth=") {
            let (scheme, value) = auth.split_once(' ')?;
            if scheme.eq_ignore_ascii_case("Bearer") {
                token = Some(value.trim());
            }
        }
    }

    match (username, token) {
        (Some(u), Some(t)) if !u.is_empty() && !t.is_empty() => Some((u.to_string(), t.to_string())),
        _ => None,
    }
}

impl AuthMechanismProcessor for XOAuth2MechanismProcessor {
    fn process_response(&mut self, data: Option<&str>) -> Result<AuthProcessResult, AuthError> {
        let Some(data) = data.filter(|d| !d.trim().is_empty()) else {
            return Ok(AuthProcessResult::Continue(String::new()));
        };

        let payload = decode_base64(data)?;
        let (username, access_token) = parse_payload(&payload).ok_or_else(|| {
            AuthError::Failure("XOAUTH2 data must contain user and Bearer token".to_string())
        })?;

        let credentials = AuthenticationCredentials::XOAuth2 {
            username,
            access_token,
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
    fn test_parse_payload() {
        assert_eq!(
            parse_payload("user=rob@x.com\x01auth=Bearer tok123\x01\x01"),
            Some(("rob@x.com".to_string(), "tok123".to_string()))
        );
        assert_eq!(parse_payload("user=\x01auth=Bearer tok\x01\x01"), None);
        assert_eq!(parse_payload("user=rob\x01auth=Bearer \x01\x01"), None);
        assert_eq!(parse_payload("garbage"), None);
    }

    #[test]
    fn test_null_first_call_continues() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = XOAuth2MechanismProcessor::new(ctx);
        assert_eq!(
            processor.process_response(None).unwrap(),
            AuthProcessResult::Continue(String::new())
        );
    }

    #[test]
    fn test_well_formed_uses_validator() {
        let (ctx, validator) = context(AuthenticationResult::Failure);
        let mut processor = XOAuth2MechanismProcessor::new(ctx);
        let data = encode_base64("user=rob\x01auth=Bearer abc\x01\x01");

        assert_eq!(
            processor.process_response(Some(&data)).unwrap(),
            AuthProcessResult::Failed
        );
        assert_eq!(
            validator.seen.lock().unwrap()[0],
            AuthenticationCredentials::XOAuth2 {
                username: "rob".to_string(),
                access_token: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_token_is_failure() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = XOAuth2MechanismProcessor::new(ctx);
        let data = encode_base64("user=rob\x01\x01");
        assert!(matches!(
            processor.process_response(Some(&data)),
            Err(AuthError::Failure(_))
        ));
    }
}
