//! CRAM-MD5 (RFC 2195).

use hmac::{Hmac, Mac};
use md5::Md5;

use super::{
    AuthContext, AuthError, AuthMechanismProcessor, AuthProcessResult, AuthenticationCredentials,
    decode_base64, encode_base64,
};

/// CRAM-MD5 exchange: one challenge, one `username digest` response.
#[derive(Debug)]
pub struct CramMd5MechanismProcessor {
    context: AuthContext,
    challenge: Option<String>,
    credentials: Option<AuthenticationCredentials>,
}

impl CramMd5MechanismProcessor {
    /// Creates a processor that has not yet issued its challenge.
    #[must_use]
    pub const fn new(context: AuthContext) -> Self {
        Self {
            context,
            challenge: None,
            credentials: None,
        }
    }

    fn build_challenge(&self) -> String {
        let random = self.context.random.next_int(u32::from(i16::MAX.unsigned_abs()));
        let ticks = self.context.clock.ticks();
        format!(
            "{random}.{ticks}@{}",
            self.context.behaviour.domain_name()
        )
    }
}

impl AuthMechanismProcessor for CramMd5MechanismProcessor {
    fn process_response(&mut self, data: Option<&str>) -> Result<AuthProcessResult, AuthError> {
        let Some(challenge) = self.challenge.clone() else {
            let challenge = self.build_challenge();
            let encoded = encode_base64(&challenge);
            self.challenge = Some(challenge);
            return Ok(AuthProcessResult::Continue(encoded));
        };

        let response = decode_base64(data.unwrap_or_default())?;
        let parts: Vec<&str> = response.split(' ').collect();
        let [username, digest] = parts.as_slice() else {
            return Err(AuthError::Failure(
                "Response in incorrect format - should be USERNAME RESPONSE".to_string(),
            ));
        };

        let credentials = AuthenticationCredentials::CramMd5 {
            username: (*username).to_string(),
            challenge,
            response: (*digest).to_string(),
        };
        let result = self.context.validate(&credentials);
        self.credentials = Some(credentials);
        Ok(result)
    }

    fn credentials(&self) -> Option<&AuthenticationCredentials> {
        self.credentials.as_ref()
    }
}

/// Computes the lowercase hex HMAC-MD5 of `challenge` keyed by `password`.
#[must_use]
pub fn cram_md5_digest(challenge: &str, password: &str) -> String {
    let Ok(mut mac) = Hmac::<Md5>::new_from_slice(password.as_bytes()) else {
        return String::new();
    };
    mac.update(challenge.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
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
    fn test_challenge_is_deterministic() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = CramMd5MechanismProcessor::new(ctx);

        let result = processor.process_response(None).unwrap();
        assert_eq!(
            result,
            AuthProcessResult::Continue(encode_base64("1234.10000@mockdomain"))
        );
    }

    #[test]
    fn test_malformed_response() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = CramMd5MechanismProcessor::new(ctx);
        processor.process_response(None).unwrap();

        let err = processor
            .process_response(Some(&encode_base64("rob")))
            .unwrap_err();
        assert!(matches!(err, AuthError::Failure(msg) if msg.contains("USERNAME RESPONSE")));
    }

    #[test]
    fn test_bad_base64() {
        let (ctx, _) = context(AuthenticationResult::Success);
        let mut processor = CramMd5MechanismProcessor::new(ctx);
        processor.process_response(None).unwrap();

        let err = processor.process_response(Some("!!not base64!!")).unwrap_err();
        assert_eq!(err, AuthError::BadBase64);
    }

    #[test]
    fn test_valid_response_follows_validator() {
        for (policy, expected) in [
            (AuthenticationResult::Success, AuthProcessResult::Success),
            (AuthenticationResult::Failure, AuthProcessResult::Failed),
        ] {
            let (ctx, validator) = context(policy);
            let mut processor = CramMd5MechanismProcessor::new(ctx);
            processor.process_response(None).unwrap();

            let result = processor
                .process_response(Some(&encode_base64("rob 0123abcd")))
                .unwrap();
            assert_eq!(result, expected);

            let seen = validator.seen.lock().unwrap();
            assert_eq!(
                seen[0],
                AuthenticationCredentials::CramMd5 {
                    username: "rob".to_string(),
                    challenge: "1234.10000@mockdomain".to_string(),
                    response: "0123abcd".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_digest_rfc2195_example() {
        let digest = cram_md5_digest(
            "<1896.697170952@postoffice.reston.mci.net>",
            "tanstaaftanstaaf",
        );
        assert_eq!(digest, "b913a602c7eda7a495b4e6e7334d3890");
    }
}
