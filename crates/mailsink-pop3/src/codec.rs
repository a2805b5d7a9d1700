//! Dot-stuffed, binary-safe multi-line transfer.
//!
//! Message bytes are split at CRLF markers only. Any line beginning with `.`
//! gets a second `.` and the block ends with a lone `.` line. Nothing else
//! about the bytes changes, so NUL and invalid UTF-8 pass through untouched.

use mailsink_core::LineChannel;

use crate::error::Result;

/// Splits raw bytes into CRLF-delimited lines.
///
/// A trailing CRLF does not produce an empty final line.
fn crlf_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut rest = data;
    while let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") {
        lines.push(&rest[..pos]);
        rest = &rest[pos + 2..];
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

/// Encodes `data` as a dot-stuffed block, terminator included.
#[must_use]
pub fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    for line in crlf_lines(data) {
        if line.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}

/// Writes `data` dot-stuffed and terminated, then flushes.
///
/// # Errors
///
/// Returns the transport error.
pub async fn write_dot_stuffed_message(channel: &mut LineChannel, data: &[u8]) -> Result<()> {
    channel.write_all(&dot_stuff(data)).await?;
    channel.flush().await?;
    Ok(())
}

/// Returns the header block, the blank line and the first `lines` body
/// lines of a message, for `TOP`.
#[must_use]
pub fn message_top(data: &[u8], lines: usize) -> Vec<u8> {
    let Some(split) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
        return data.to_vec();
    };

    let mut out = data[..split + 4].to_vec();
    let body = crlf_lines(&data[split + 4..]);
    let taken = body.iter().take(lines).copied().collect::<Vec<_>>();
    out.extend_from_slice(&taken.join(&b"\r\n"[..]));
    out
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
    use proptest::prelude::*;

    /// Reverses [`dot_stuff`]: drops the terminator and one leading dot per line.
    fn dot_unstuff(block: &[u8]) -> Vec<u8> {
        let body = block.strip_suffix(b".\r\n").unwrap();
        let mut out = Vec::new();
        for line in crlf_lines(body) {
            out.extend_from_slice(line.strip_prefix(b".").unwrap_or(line));
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    mod stuffing_tests {
        use super::*;

        #[test]
        fn leading_dots_are_doubled() {
            assert_eq!(dot_stuff(b"a\r\n.\r\n..b\r\n"), b"a\r\n..\r\n...b\r\n.\r\n");
        }

        #[test]
        fn missing_final_crlf_is_added() {
            assert_eq!(dot_stuff(b"abc"), b"abc\r\n.\r\n");
        }

        #[test]
        fn empty_message() {
            assert_eq!(dot_stuff(b""), b".\r\n");
        }

        #[test]
        fn binary_bytes_pass_through() {
            let data = b"\x00\xff\xfe\r\n.\x00\n.x\r\n";
            assert_eq!(dot_stuff(data), b"\x00\xff\xfe\r\n..\x00\n.x\r\n.\r\n");
        }

        #[test]
        fn blank_lines_are_kept() {
            assert_eq!(dot_stuff(b"a\r\n\r\nb\r\n"), b"a\r\n\r\nb\r\n.\r\n");
        }
    }

    mod top_tests {
        use super::*;

        #[test]
        fn takes_requested_body_lines() {
            let data = b"Subject: x\r\nFrom: a\r\n\r\none\r\ntwo\r\nthree\r\n";
            assert_eq!(message_top(data, 2), b"Subject: x\r\nFrom: a\r\n\r\none\r\ntwo");
            assert_eq!(message_top(data, 0), b"Subject: x\r\nFrom: a\r\n\r\n");
        }

        #[test]
        fn headers_only() {
            assert_eq!(message_top(b"Subject: x", 5), b"Subject: x");
        }
    }

    proptest! {
        #[test]
        fn round_trip(lines in proptest::collection::vec(
            prop_oneof![
                proptest::collection::vec(any::<u8>().prop_filter("no CR", |b| *b != b'\r'), 0..20),
                proptest::collection::vec(any::<u8>().prop_filter("no CR", |b| *b != b'\r'), 0..5)
                    .prop_map(|mut l| { l.insert(0, b'.'); l }),
            ],
            0..10,
        ), trailing_crlf in any::<bool>()) {
            let mut data = lines.join(&b"\r\n"[..]);
            if trailing_crlf && !data.is_empty() {
                data.extend_from_slice(b"\r\n");
            }

            let restored = dot_unstuff(&dot_stuff(&data));
            let mut expected = data.clone();
            if !expected.is_empty() && !expected.ends_with(b"\r\n") {
                expected.extend_from_slice(b"\r\n");
            }
            prop_assert_eq!(restored, expected);
        }
    }
}
