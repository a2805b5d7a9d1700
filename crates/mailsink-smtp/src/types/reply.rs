//! Server replies.

use std::fmt;

/// A reply written to the client, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// Three-digit code repeated on every line.
    pub code: ReplyCode,
    /// Text of each line.
    pub message: Vec<String>,
}

impl SmtpResponse {
    /// One-line reply.
    #[must_use]
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: vec![message.into()],
        }
    }

    /// Reply with one line per entry of `message`.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn multiline(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Text of all lines joined by `\n`, for logs and errors.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Lines as sent, without CRLF: `250-a`, `250-b`, `250 c`.
    #[must_use]
    pub fn wire_lines(&self) -> Vec<String> {
        let Some((last, init)) = self.message.split_last() else {
            return vec![self.code.to_string()];
        };

        init.iter()
            .map(|line| format!("{}-{line}", self.code))
            .chain(std::iter::once(format!("{} {last}", self.code)))
            .collect()
    }
}

impl fmt::Display for SmtpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_lines().join("\r\n"))
    }
}

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2yz
    Completed,
    /// 3yz, the server waits for more input.
    Intermediate,
    /// 4yz
    TransientFailure,
    /// 5yz
    PermanentFailure,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Class of the reply, `None` outside 200..=599.
    #[must_use]
    pub const fn class(self) -> Option<ReplyClass> {
        match self.0 / 100 {
            2 => Some(ReplyClass::Completed),
            3 => Some(ReplyClass::Intermediate),
            4 => Some(ReplyClass::TransientFailure),
            5 => Some(ReplyClass::PermanentFailure),
            _ => None,
        }
    }
}

impl ReplyCode {
    /// Greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// Reply to QUIT.
    pub const CLOSING: Self = Self(221);
    /// AUTH accepted.
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// Command completed.
    pub const OK: Self = Self(250);
    /// AUTH challenge; client sends the next step.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// DATA accepted; send the message.
    pub const START_DATA: Self = Self(354);
    /// No certificate for STARTTLS.
    pub const TLS_NOT_AVAILABLE: Self = Self(454);
    /// Unrecognised command.
    pub const SYNTAX_ERROR: Self = Self(500);
    /// Malformed arguments.
    pub const PARAMETER_ERROR: Self = Self(501);
    /// Known but unsupported command or mechanism.
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// Command out of order.
    pub const BAD_SEQUENCE: Self = Self(503);
    /// Unknown sub-command.
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// MAIL before a required AUTH.
    pub const AUTH_REQUIRED: Self = Self(530);
    /// Credentials rejected.
    pub const AUTH_FAILED: Self = Self(535);
    /// Mechanism needs a secure connection.
    pub const ENCRYPTION_REQUIRED: Self = Self(538);
    /// Message larger than the limit.
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// Unknown MAIL parameter.
    pub const PARAMETERS_NOT_RECOGNIZED: Self = Self(555);
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
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
    fn reply_classes() {
        assert_eq!(ReplyCode::OK.class(), Some(ReplyClass::Completed));
        assert_eq!(ReplyCode::AUTH_CONTINUE.class(), Some(ReplyClass::Intermediate));
        assert_eq!(ReplyCode::START_DATA.class(), Some(ReplyClass::Intermediate));
        assert_eq!(ReplyCode::TLS_NOT_AVAILABLE.class(), Some(ReplyClass::TransientFailure));
        assert_eq!(ReplyCode::ENCRYPTION_REQUIRED.class(), Some(ReplyClass::PermanentFailure));
        assert_eq!(ReplyCode::new(99).class(), None);
        assert_eq!(ReplyCode::new(421).to_string(), "421");
    }

    #[test]
    fn ehlo_style_reply() {
        let response = SmtpResponse::multiline(
            ReplyCode::OK,
            vec!["host".to_string(), "8BITMIME".to_string(), "SIZE".to_string()],
        );
        assert_eq!(
            response.wire_lines(),
            vec!["250-host", "250-8BITMIME", "250 SIZE"]
        );
        assert_eq!(response.to_string(), "250-host\r\n250-8BITMIME\r\n250 SIZE");
    }

    #[test]
    fn one_line_reply() {
        let response = SmtpResponse::new(ReplyCode::START_DATA, "End message with period");
        assert_eq!(response.wire_lines(), vec!["354 End message with period"]);
    }

    #[test]
    fn reply_without_text() {
        let response = SmtpResponse::multiline(ReplyCode::OK, vec![]);
        assert_eq!(response.wire_lines(), vec!["250"]);
        assert_eq!(response.message_text(), "");
    }
}
