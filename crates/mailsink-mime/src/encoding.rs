//! Header decoding utilities.
//!
//! Supports Base64 and the RFC 2047 `B` and `Q` encoded-word forms.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data.trim()).map_err(Into::into)
}

/// Decodes the RFC 2047 `Q` form: quoted-printable with `_` standing for space.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_q(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let byte = bytes
                    .get(i + 1..i + 3)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or(Error::BadEscape(i))?;
                result.push(byte);
                i += 3;
            }
            other => {
                result.push(other);
                i += 1;
            }
        }
    }

    Ok(result)
}

/// Decodes one RFC 2047 encoded word.
///
/// Format: `=?charset?encoding?encoded-text?=`. Text that is not an encoded
/// word is returned unchanged.
///
/// # Errors
///
/// Returns an error if the word is malformed or uses an unknown encoding.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.starts_with("=?") || !text.ends_with("?=") || text.len() < 4 {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.splitn(3, '?').collect();

    if parts.len() != 3 {
        return Err(Error::MalformedWord(text.to_string()));
    }

    let charset = parts[0].to_ascii_lowercase();
    let bytes = match parts[1].to_ascii_uppercase().as_str() {
        "B" => decode_base64(parts[2])?,
        "Q" => decode_q(parts[2])?,
        other => {
            return Err(Error::UnknownEncoding(other.to_string()));
        }
    };

    match charset.as_str() {
        "iso-8859-1" | "latin1" | "windows-1252" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        _ => String::from_utf8(bytes).map_err(Into::into),
    }
}

/// Decodes every encoded word inside a header value.
///
/// Whitespace between two adjacent encoded words is dropped, as RFC 2047
/// requires. Words that fail to decode are kept verbatim.
#[must_use]
pub fn decode_header_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut pending_space = String::new();
    let mut previous_was_encoded = false;

    for token in split_keeping_whitespace(value) {
        if token.chars().all(char::is_whitespace) {
            pending_space.push_str(token);
            continue;
        }

        let decoded = if token.starts_with("=?") && token.ends_with("?=") {
            decode_rfc2047(token).ok()
        } else {
            None
        };

        match decoded {
            Some(text) => {
                if !previous_was_encoded {
                    result.push_str(&pending_space);
                }
                result.push_str(&text);
                previous_was_encoded = true;
            }
            None => {
                result.push_str(&pending_space);
                result.push_str(token);
                previous_was_encoded = false;
            }
        }
        pending_space.clear();
    }

    result.push_str(&pending_space);
    result
}

fn split_keeping_whitespace(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in value.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(current) if current != is_space => {
                tokens.push(&value[start..idx]);
                start = idx;
                in_space = Some(is_space);
            }
            None => in_space = Some(is_space),
            _ => {}
        }
    }

    if start < value.len() {
        tokens.push(&value[start..]);
    }
    tokens
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
    fn test_base64_decode() {
        let decoded = decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_q_decode() {
        assert_eq!(decode_q("H=C3=A9llo_world").unwrap(), "Héllo world".as_bytes());
        assert!(decode_q("bad=4").is_err());
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?iso-8859-1?Q?H=E9llo?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(matches!(
            decode_rfc2047("=?utf-8?X?abc?="),
            Err(Error::UnknownEncoding(e)) if e == "X"
        ));
        assert!(matches!(decode_rfc2047("=?utf-8?B?="), Err(Error::MalformedWord(_))));
    }

    #[test]
    fn test_header_value_mixed() {
        assert_eq!(
            decode_header_value("Re: =?utf-8?B?SMOpbGxv?= there"),
            "Re: Héllo there"
        );
    }

    #[test]
    fn test_header_value_adjacent_words_join() {
        assert_eq!(
            decode_header_value("=?utf-8?Q?a?= =?utf-8?Q?b?="),
            "ab"
        );
    }

    #[test]
    fn test_header_value_plain() {
        assert_eq!(decode_header_value("Just text"), "Just text");
    }
}
