//! Raw message view.

use chrono::{DateTime, FixedOffset};

use crate::address::{extract_addresses, parse_mailbox};
use crate::header::Headers;

/// A raw message split into its parsed header block and untouched body.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    headers: Headers,
    header_block: &'a [u8],
    body: &'a [u8],
}

impl<'a> Message<'a> {
    /// Parses a raw message.
    ///
    /// Never fails: a message without a header/body separator is treated as
    /// all headers, and non-UTF-8 header bytes are replaced lossily.
    #[must_use]
    pub fn parse(raw: &'a [u8]) -> Self {
        let (header_block, body) = split_header_block(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_block));
        Self {
            headers,
            header_block,
            body,
        }
    }

    /// Returns the parsed headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the header block including the terminating blank line.
    #[must_use]
    pub const fn header_block(&self) -> &'a [u8] {
        self.header_block
    }

    /// Returns the body bytes after the blank line.
    #[must_use]
    pub const fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Returns the bare address of the first `From` mailbox.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.headers
            .get_decoded("from")
            .and_then(|v| extract_addresses(&v).into_iter().next())
            .or_else(|| self.headers.get("sender").and_then(parse_mailbox))
    }

    /// Returns every address found in `To`, `Cc` and `Bcc`.
    #[must_use]
    pub fn to(&self) -> Vec<String> {
        ["to", "cc", "bcc"]
            .iter()
            .flat_map(|name| self.headers.get_all(name))
            .flat_map(extract_addresses)
            .collect()
    }

    /// Returns the decoded subject.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// Returns the `Date` header parsed as RFC 2822.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers
            .get("date")
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
    }
}

fn split_header_block(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&raw[..2], &raw[2..]);
    }
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return (&raw[..pos + 4], &raw[pos + 4..]);
    }
    if let Some(pos) = raw.windows(2).position(|w| w == b"\n\n") {
        return (&raw[..pos + 2], &raw[pos + 2..]);
    }
    (raw, &[])
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

    const RAW: &[u8] = b"From: \"Alice\" <alice@example.com>\r\n\
To: bob@example.com\r\n\
Cc: Carol <carol@example.com>\r\n\
Subject: Hello\r\n\
Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
\r\n\
Body line\r\n";

    #[test]
    fn test_envelope_fields() {
        let msg = Message::parse(RAW);
        assert_eq!(msg.from().as_deref(), Some("alice@example.com"));
        assert_eq!(msg.to(), vec!["bob@example.com", "carol@example.com"]);
        assert_eq!(msg.subject().as_deref(), Some("Hello"));
        assert!(msg.date().is_some());
    }

    #[test]
    fn test_body_split() {
        let msg = Message::parse(RAW);
        assert_eq!(msg.body(), b"Body line\r\n");
        assert!(msg.header_block().ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn test_no_separator() {
        let msg = Message::parse(b"Subject: x");
        assert_eq!(msg.subject().as_deref(), Some("x"));
        assert!(msg.body().is_empty());
    }

    #[test]
    fn test_binary_body_untouched() {
        let raw = b"Subject: bin\r\n\r\n\x00\xff\xfe";
        let msg = Message::parse(raw);
        assert_eq!(msg.body(), b"\x00\xff\xfe");
    }
}
