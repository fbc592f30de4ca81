//! Framed I/O for the IMAP wire.
//!
//! Replies are CRLF-terminated lines; a line ending in a `{n}` size
//! token is followed by exactly n bytes of literal payload. Each read
//! yields one line with its literal (if any) already detached, which
//! is the fragment shape the reassembler consumes.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::Result;
use crate::fragment::Fragment;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Framed connection over an IMAP transport.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one reply fragment: a line, with its announced literal (if
    /// any) read in full and detached.
    ///
    /// The returned text has the CRLF stripped and the `{n}` token left
    /// in place.
    pub async fn read_fragment(&mut self) -> Result<Fragment> {
        let line = self.read_line().await?;

        let Some(literal_len) = trailing_literal_length(&line) else {
            return Ok(Fragment::Text(line));
        };

        if literal_len > MAX_LITERAL_SIZE {
            return Err(crate::Error::Protocol(format!(
                "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
            )));
        }

        let mut payload = vec![0u8; literal_len];
        self.reader.read_exact(&mut payload).await?;

        Ok(Fragment::Literal {
            text: line,
            payload,
        })
    }

    /// Reads a single CRLF-terminated line, stripping the CRLF.
    ///
    /// The terminator is located by its LF byte, so a CRLF split
    /// across two transport reads still ends the line correctly.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(crate::Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(crate::Error::Protocol("line too long".to_string()));
            }
        }

        Ok(line)
    }

    /// Writes a serialized command to the stream.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Writes raw bytes to the stream (for outgoing literals).
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }
}

/// Parses a literal length from the end of a CRLF-stripped line.
///
/// Matches `{123}` or `{123+}` (non-synchronizing).
fn trailing_literal_length(line: &[u8]) -> Option<usize> {
    let open = line.iter().rposition(|&b| b == b'{')?;

    if !line.ends_with(b"}") {
        return None;
    }

    let num_start = open + 1;
    let num_end = if line.ends_with(b"+}") {
        line.len() - 2
    } else {
        line.len() - 1
    };

    let num_str = std::str::from_utf8(line.get(num_start..num_end)?).ok()?;
    num_str.parse().ok()
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
    fn test_trailing_literal_length() {
        assert_eq!(trailing_literal_length(b"BODY {123}"), Some(123));
        assert_eq!(trailing_literal_length(b"BODY {123+}"), Some(123));
        assert_eq!(trailing_literal_length(b"{0}"), Some(0));
        assert_eq!(trailing_literal_length(b"no literal"), None);
        assert_eq!(trailing_literal_length(b"mid {12} tail"), None);
        assert_eq!(trailing_literal_length(b"wrong {abc}"), None);
    }

    #[tokio::test]
    async fn read_plain_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let fragment = framed.read_fragment().await.unwrap();
        assert_eq!(fragment, Fragment::Text(b"* OK ready".to_vec()));
    }

    #[tokio::test]
    async fn read_line_with_literal() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 FETCH (RFC822 {5}\r\n")
            .read(b"hello")
            .read(b")\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let first = framed.read_fragment().await.unwrap();
        assert_eq!(
            first,
            Fragment::Literal {
                text: b"* 1 FETCH (RFC822 {5}".to_vec(),
                payload: b"hello".to_vec(),
            }
        );

        let second = framed.read_fragment().await.unwrap();
        assert_eq!(second, Fragment::Text(b")".to_vec()));
    }

    #[tokio::test]
    async fn terminator_split_across_reads_still_ends_the_line() {
        use tokio_test::io::Builder;

        // TCP is free to segment between the CR and the LF; the line
        // boundary must survive it.
        let mock = Builder::new()
            .read(b"* OK ready\r")
            .read(b"\n* 2 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"* OK ready");
        assert_eq!(framed.read_line().await.unwrap(), b"* 2 EXISTS");
    }

    #[tokio::test]
    async fn write_command_flushes() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"A0000 CHECK\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0000 CHECK\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn oversized_literal_rejected() {
        use tokio_test::io::Builder;

        let header = format!("* 1 FETCH (RFC822 {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_fragment().await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("literal too large")
        );
    }

    #[tokio::test]
    async fn overlong_line_rejected() {
        use tokio_test::io::Builder;

        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_fragment().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }
}
