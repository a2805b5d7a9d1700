//! ANONYMOUS mechanism.

use super::{AuthError, AuthMechanismProcessor, AuthProcessResult, AuthenticationCredentials};

/// Succeeds immediately; any trace data the client sends is ignored.
///
/// Whether anonymous access is allowed at all is decided by mechanism
/// enablement before a processor is created.
#[derive(Debug, Default)]
pub struct AnonymousMechanismProcessor {
    credentials: Option<AuthenticationCredentials>,
}

impl AnonymousMechanismProcessor {
    /// Creates a processor.
    #[must_use]
    pub const fn new() -> Self {
        Self { credentials: None }
    }
}

impl AuthMechanismProcessor for AnonymousMechanismProcessor {
    fn process_response(&mut self, _data: Option<&str>) -> Result<AuthProcessResult, AuthError> {
        self.credentials = Some(AuthenticationCredentials::Anonymous);
        Ok(AuthProcessResult::Success)
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

    #[test]
    fn test_immediate_success() {
        let mut processor = AnonymousMechanismProcessor::new();
        assert_eq!(
            processor.process_response(None).unwrap(),
            AuthProcessResult::Success
        );
        assert_eq!(
            processor.credentials(),
            Some(&AuthenticationCredentials::Anonymous)
        );
    }
}
