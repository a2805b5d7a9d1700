//! Line-oriented connection channel shared by the protocol servers.
//!
//! A [`LineChannel`] reads CRLF-terminated lines as raw bytes, writes
//! responses, and can swap its stream for a TLS-wrapped one in place. Every
//! read, write and handshake honours the receive timeout and the
//! connection's cancellation token. Lines longer than the channel's limit
//! are drained and reported as [`Error::LineTooLong`].

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    ReadBuf,
};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Default limit on one line, terminator included.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Any bidirectional byte stream a session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AsyncStream for T {}

/// A stream that is either plaintext or server-side TLS.
enum ChannelStream {
    Plain(Box<dyn AsyncStream>),
    Tls(Box<TlsStream<Box<dyn AsyncStream>>>),
}

impl AsyncRead for ChannelStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ChannelStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Runs an I/O future under the receive timeout and cancellation token.
async fn guarded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => Ok(inner?),
            Err(_) => Err(Error::Timeout),
        },
    }
}

/// Reads through the next `\n`, keeping at most `limit` bytes in `line`.
///
/// Once the limit is passed the rest of the line is consumed and dropped so
/// the next read starts on a fresh line. Returns the bytes consumed and
/// whether the line overflowed.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
    limit: usize,
) -> io::Result<(usize, bool)> {
    let mut consumed = 0;
    let mut overflow = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((consumed, overflow));
        }

        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (end + 1, true),
            None => (available.len(), false),
        };
        if !overflow {
            if line.len() + used > limit {
                overflow = true;
                line.clear();
            } else {
                line.extend_from_slice(&available[..used]);
            }
        }
        reader.consume(used);
        consumed += used;

        if done {
            return Ok((consumed, overflow));
        }
    }
}

/// A CRLF line channel over a plain or TLS stream.
pub struct LineChannel {
    // `None` only after a failed TLS upgrade consumed the stream.
    stream: Option<BufReader<ChannelStream>>,
    receive_timeout: Duration,
    max_line_length: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for LineChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineChannel")
            .field("secure", &self.is_secure())
            .field("open", &self.stream.is_some())
            .field("receive_timeout", &self.receive_timeout)
            .field("max_line_length", &self.max_line_length)
            .finish_non_exhaustive()
    }
}

impl LineChannel {
    /// Wraps a plaintext stream.
    pub fn new(
        stream: impl AsyncStream + 'static,
        receive_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream: Some(BufReader::new(ChannelStream::Plain(Box::new(stream)))),
            receive_timeout,
            max_line_length: MAX_LINE_LENGTH,
            cancel,
        }
    }

    /// Replaces the [`MAX_LINE_LENGTH`] default.
    #[must_use]
    pub const fn with_max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Returns true once the stream has been wrapped in TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(
            self.stream.as_ref().map(BufReader::get_ref),
            Some(ChannelStream::Tls(_))
        )
    }

    /// Returns the cancellation token this channel observes.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn stream_mut(&mut self) -> Result<&mut BufReader<ChannelStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("channel closed after failed TLS upgrade".into()))
    }

    /// Reads one line as raw bytes with the line terminator removed.
    ///
    /// Returns `None` when the peer closed the connection before sending
    /// anything. A bare `\n` terminator is accepted as well as CRLF. A line
    /// over the length limit is read to its end, discarded, and reported as
    /// [`Error::LineTooLong`]; the channel stays usable.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let cancel = self.cancel.clone();
        let timeout = self.receive_timeout;
        let limit = self.max_line_length;
        let reader = self.stream_mut()?;

        let mut line = Vec::new();
        let (read, overflow) =
            guarded(&cancel, timeout, read_bounded_line(reader, &mut line, limit)).await?;
        if overflow {
            debug!(limit, consumed = read, "Discarded overlong line");
            return Err(Error::LineTooLong(limit));
        }
        if read == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Reads one line and decodes it lossily as UTF-8.
    pub async fn read_text_line(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_line()
            .await?
            .map(|line| String::from_utf8_lossy(&line).into_owned()))
    }

    /// Reads exactly `len` bytes, as announced by an IMAP literal.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let cancel = self.cancel.clone();
        let timeout = self.receive_timeout;
        let reader = self.stream_mut()?;

        let mut data = vec![0u8; len];
        guarded(&cancel, timeout, reader.read_exact(&mut data)).await?;
        Ok(data)
    }

    /// Writes `line` followed by CRLF and flushes.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let cancel = self.cancel.clone();
        let timeout = self.receive_timeout;
        let writer = self.stream_mut()?.get_mut();

        guarded(&cancel, timeout, async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
            writer.flush().await
        })
        .await
    }

    /// Writes raw bytes without flushing.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let cancel = self.cancel.clone();
        let timeout = self.receive_timeout;
        let writer = self.stream_mut()?.get_mut();
        guarded(&cancel, timeout, writer.write_all(data)).await
    }

    /// Flushes buffered writes.
    pub async fn flush(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let timeout = self.receive_timeout;
        let writer = self.stream_mut()?.get_mut();
        guarded(&cancel, timeout, writer.flush()).await
    }

    /// Performs a server-side TLS handshake on the current stream and
    /// rebinds the reader and writer to the encrypted stream.
    ///
    /// On failure the channel is left closed.
    pub async fn upgrade_to_tls(&mut self, acceptor: &TlsAcceptor) -> Result<()> {
        let plain = match self.stream.take() {
            Some(reader) => match reader.into_inner() {
                ChannelStream::Plain(stream) => stream,
                tls @ ChannelStream::Tls(_) => {
                    self.stream = Some(BufReader::new(tls));
                    return Err(Error::InvalidState("stream is already TLS".into()));
                }
            },
            None => {
                return Err(Error::InvalidState(
                    "channel closed after failed TLS upgrade".into(),
                ));
            }
        };

        let tls = guarded(&self.cancel, self.receive_timeout, acceptor.accept(plain)).await?;
        debug!("TLS handshake completed");
        self.stream = Some(BufReader::new(ChannelStream::Tls(Box::new(tls))));
        Ok(())
    }

    /// Shuts down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(reader) = self.stream.as_mut() {
            reader.get_mut().shutdown().await?;
        }
        Ok(())
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

    fn channel_pair() -> (LineChannel, tokio::io::DuplexStream) {
        let (server, client) = tokio::io::duplex(1024);
        let channel = LineChannel::new(server, Duration::from_secs(5), CancellationToken::new());
        (channel, client)
    }

    #[tokio::test]
    async fn test_read_lines_strip_terminators() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"HELO a\r\nNOOP\n\xff\x00\r\n").await.unwrap();
        drop(client);

        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"HELO a");
        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"NOOP");
        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"\xff\x00");
        assert!(channel.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_exact_after_line() {
        let (mut channel, mut client) = channel_pair();
        client.write_all(b"A1 APPEND x {5}\r\nab\r\nc\r\n").await.unwrap();

        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"A1 APPEND x {5}");
        assert_eq!(channel.read_exact(5).await.unwrap(), b"ab\r\nc");
        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"");
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        let (mut channel, mut client) = channel_pair();
        channel.write_line("250 OK").await.unwrap();

        let mut buf = [0u8; 8];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"250 OK\r\n");
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let (mut channel, _client) = channel_pair();
        channel.cancellation().cancel();
        let err = channel.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (server, _client) = tokio::io::duplex(64);
        let mut channel = LineChannel::new(server, Duration::from_secs(1), CancellationToken::new());
        let err = channel.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_overlong_line_is_discarded() {
        let (server, mut client) = tokio::io::duplex(64);
        let mut channel = LineChannel::new(server, Duration::from_secs(5), CancellationToken::new())
            .with_max_line_length(16);
        let writer = tokio::spawn(async move {
            client.write_all(&[b'x'; 200]).await.unwrap();
            client.write_all(b"\r\nNOOP\r\n0123456789abcd\r\n").await.unwrap();
            client
        });

        let err = channel.read_line().await.unwrap_err();
        assert!(matches!(err, Error::LineTooLong(16)));
        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"NOOP");
        assert_eq!(channel.read_line().await.unwrap().unwrap(), b"0123456789abcd");
        drop(writer.await.unwrap());
        assert!(channel.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unterminated_flood_is_bounded() {
        let (server, mut client) = tokio::io::duplex(1024);
        let mut channel = LineChannel::new(server, Duration::from_secs(5), CancellationToken::new())
            .with_max_line_length(1024);
        let writer = tokio::spawn(async move {
            let chunk = [b'a'; 4096];
            for _ in 0..256 {
                client.write_all(&chunk).await.unwrap();
            }
        });

        let err = channel.read_line().await.unwrap_err();
        assert!(matches!(err, Error::LineTooLong(1024)));
        writer.await.unwrap();
    }

    #[test]
    fn test_plain_channel_is_not_secure() {
        let (channel, _client) = channel_pair();
        assert!(!channel.is_secure());
    }
}
