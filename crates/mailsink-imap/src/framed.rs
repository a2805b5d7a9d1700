//! Command framing: lines with embedded literals.
//!
//! A client command is a CRLF-terminated line, except that a line ending in
//! `{n}` or `{n+}` is followed by `n` octets of literal data and then the
//! rest of the command. Synchronizing literals are acknowledged with a
//! continuation request before the octets are read.

use mailsink_core::LineChannel;

use crate::{Error, Result};

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Maximum number of literals in one command.
const MAX_LITERALS: usize = 16;

/// A literal announced at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LiteralPrefix {
    pub len: usize,
    pub synchronizing: bool,
}

/// Reads one complete command with literals spliced in.
///
/// Returns `None` when the client disconnected between commands.
///
/// # Errors
///
/// Returns the transport error, or [`Error::Protocol`] for an oversized
/// line or literal or a disconnect in the middle of a command.
pub async fn read_command(channel: &mut LineChannel) -> Result<Option<Vec<u8>>> {
    let Some(mut command) = read_line(channel).await? else {
        return Ok(None);
    };

    let mut literals = 0;
    let mut tail_start = 0;
    while let Some(prefix) = parse_literal_prefix(&command[tail_start..]) {
        literals += 1;
        if prefix.len > MAX_LITERAL_SIZE || literals > MAX_LITERALS {
            return Err(Error::Protocol(format!(
                "literal too large: {} bytes (max {MAX_LITERAL_SIZE})",
                prefix.len
            )));
        }
        if prefix.synchronizing {
            channel.write_line("+ Ready for literal data").await?;
        }

        command.extend_from_slice(b"\r\n");
        command.extend_from_slice(&channel.read_exact(prefix.len).await?);

        tail_start = command.len();
        let rest = read_line(channel)
            .await?
            .ok_or_else(|| Error::Protocol("connection closed inside a command".to_string()))?;
        command.extend_from_slice(&rest);
    }

    Ok(Some(command))
}

async fn read_line(channel: &mut LineChannel) -> Result<Option<Vec<u8>>> {
    channel.read_line().await.map_err(|error| match error {
        mailsink_core::Error::LineTooLong(limit) => {
            Error::Protocol(format!("command line exceeds {limit} bytes"))
        }
        other => other.into(),
    })
}

/// Parses a `{n}` or `{n+}` literal prefix at the end of a line.
pub(crate) fn parse_literal_prefix(line: &[u8]) -> Option<LiteralPrefix> {
    let inner = line.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    let (digits, synchronizing) = match digits.strip_suffix(b"+") {
        Some(digits) => (digits, false),
        None => (digits, true),
    };

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some(LiteralPrefix { len, synchronizing })
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
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    fn channel_pair() -> (LineChannel, tokio::io::DuplexStream) {
        let (server, client) = tokio::io::duplex(4096);
        let channel = LineChannel::new(server, Duration::from_secs(5), CancellationToken::new());
        (channel, client)
    }

    mod prefix_tests {
        use super::*;

        #[test]
        fn test_synchronizing_and_plus() {
            assert_eq!(
                parse_literal_prefix(b"a LOGIN {3}"),
                Some(LiteralPrefix {
                    len: 3,
                    synchronizing: true
                })
            );
            assert_eq!(
                parse_literal_prefix(b"a APPEND x {120+}"),
                Some(LiteralPrefix {
                    len: 120,
                    synchronizing: false
                })
            );
        }

        #[test]
        fn test_not_a_literal() {
            assert_eq!(parse_literal_prefix(b"a NOOP"), None);
            assert_eq!(parse_literal_prefix(b"a LIST \"\" {}"), None);
            assert_eq!(parse_literal_prefix(b"a SEARCH TEXT {x}"), None);
        }
    }

    #[tokio::test]
    async fn test_plain_line() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"a1 NOOP\r\n").await.unwrap();
        assert_eq!(read_command(&mut channel).await.unwrap().unwrap(), b"a1 NOOP");
    }

    #[tokio::test]
    async fn test_synchronizing_literal_gets_continuation() {
        let (mut channel, mut client) = channel_pair();
        client
            .write_all(b"a1 LOGIN {3}\r\nrob {6}\r\nsecret\r\n")
            .await
            .unwrap();

        let command = read_command(&mut channel).await.unwrap().unwrap();
        assert_eq!(command, b"a1 LOGIN {3}\r\nrob {6}\r\nsecret");

        let mut buf = vec![0u8; 52];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"+ Ready for literal data\r\n+ Ready for literal data\r\n");
    }

    #[tokio::test]
    async fn test_overlong_command_line_is_protocol_error() {
        let (channel, mut client) = channel_pair();
        let mut channel = channel.with_max_line_length(32);
        client.write_all(&[b'x'; 100]).await.unwrap();
        client.write_all(b"\r\n").await.unwrap();

        let err = read_command(&mut channel).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref message) if message.contains("32 bytes")));
    }

    #[tokio::test]
    async fn test_literal_plus_is_not_acknowledged() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"a1 LOGIN rob {2+}\r\npw\r\n").await.unwrap();
        drop(client);

        let command = read_command(&mut channel).await.unwrap().unwrap();
        assert_eq!(command, b"a1 LOGIN rob {2+}\r\npw");
    }

    #[tokio::test]
    async fn test_literal_content_is_not_rescanned() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"a1 APPEND x {3+}\r\n{1}\r\n").await.unwrap();

        let command = read_command(&mut channel).await.unwrap().unwrap();
        assert_eq!(command, b"a1 APPEND x {3+}\r\n{1}");
    }

    #[tokio::test]
    async fn test_continuation_precedes_literal_read() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"a1 APPEND INBOX {5}\r\n")
            .write(b"+ Ready for literal data\r\n")
            .read(b"hello\r\n")
            .build();
        let mut channel = LineChannel::new(mock, Duration::from_secs(5), CancellationToken::new());

        let command = read_command(&mut channel).await.unwrap().unwrap();
        assert_eq!(command, b"a1 APPEND INBOX {5}\r\nhello");
    }

    #[tokio::test]
    async fn test_read_simple_line_from_mock() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"a1 CAPABILITY\r\n").build();
        let mut channel = LineChannel::new(mock, Duration::from_secs(5), CancellationToken::new());

        assert_eq!(read_command(&mut channel).await.unwrap().unwrap(), b"a1 CAPABILITY");
        assert!(read_command(&mut channel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_literal() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"a1 APPEND x {999999999}\r\n").await.unwrap();
        assert!(matches!(
            read_command(&mut channel).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_between_commands() {
        let (mut channel, client) = channel_pair();
        drop(client);
        assert!(read_command(&mut channel).await.unwrap().is_none());
    }
}
