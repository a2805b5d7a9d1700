//! SMTP AUTH mechanism identifiers.

use std::fmt;

/// SASL authentication mechanism offered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - single base64 message
    Plain,
    /// LOGIN - legacy username/password prompts
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` bearer token
    XOAuth2,
    /// ANONYMOUS - no credentials
    Anonymous,
}

impl AuthMechanism {
    /// Every mechanism the server implements, in advertisement order.
    pub const ALL: [Self; 5] = [
        Self::CramMd5,
        Self::Plain,
        Self::Login,
        Self::Anonymous,
        Self::XOAuth2,
    ];

    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "ANONYMOUS" => Some(Self::Anonymous),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::Anonymous => "ANONYMOUS",
        }
    }

    /// Returns true if the mechanism sends the password in the clear.
    #[must_use]
    pub const fn is_plain_text(self) -> bool {
        matches!(self, Self::Plain | Self::Login)
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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
    fn parse_is_case_insensitive() {
        assert_eq!(AuthMechanism::parse("plain"), Some(AuthMechanism::Plain));
        assert_eq!(AuthMechanism::parse("Cram-Md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::parse("anonymous"), Some(AuthMechanism::Anonymous));
        assert_eq!(AuthMechanism::parse("OAUTHBEARER"), None);
    }

    #[test]
    fn names_round_trip() {
        for mechanism in AuthMechanism::ALL {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
        }
    }

    #[test]
    fn plain_text_mechanisms() {
        assert!(AuthMechanism::Login.is_plain_text());
        assert!(!AuthMechanism::CramMd5.is_plain_text());
    }
}
