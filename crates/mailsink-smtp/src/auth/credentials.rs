//! Credentials produced by AUTH mechanisms.

/// Credentials captured by a completed mechanism exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationCredentials {
    /// LOGIN mechanism username and password.
    UsernameAndPassword {
        /// Login name.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// PLAIN mechanism credentials.
    Plain {
        /// Authorization identity, often empty.
        authzid: String,
        /// Authentication identity.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// CRAM-MD5 exchange.
    CramMd5 {
        /// Login name.
        username: String,
        /// Challenge the server issued, before base64 encoding.
        challenge: String,
        /// Client's hex HMAC-MD5 digest.
        response: String,
    },
    /// XOAUTH2 bearer token.
    XOAuth2 {
        /// Login name.
        username: String,
        /// Bearer token.
        access_token: String,
    },
    /// ANONYMOUS mechanism.
    Anonymous,
}

impl AuthenticationCredentials {
    /// Returns the username, if the mechanism carries one.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UsernameAndPassword { username, .. }
            | Self::Plain { username, .. }
            | Self::CramMd5 { username, .. }
            | Self::XOAuth2 { username, .. } => Some(username),
            Self::Anonymous => None,
        }
    }
}

/// Outcome of validating credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationResult {
    /// Credentials accepted.
    Success,
    /// Credentials rejected.
    Failure,
}

impl From<bool> for AuthenticationResult {
    fn from(ok: bool) -> Self {
        if ok { Self::Success } else { Self::Failure }
    }
}
