//! Streaming response reader.
//!
//! IMAP uses CRLF-terminated lines with embedded literals: a line ending in
//! `{n}` is followed by exactly `n` raw bytes, which may contain anything
//! including CRLF, after which the line continues. The reader assembles one
//! logical response at a time and hands it to [`parse_line`].

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::response::{Response, parse_line};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Lazy, non-restartable sequence of responses read from a byte stream.
///
/// All progress is stored in the reader itself, so a `next_response` future
/// that is dropped part way can be polled again later without losing bytes.
/// After a framing error the reader refuses to continue; a fresh reader bound
/// to a fresh stream is needed.
pub struct ResponseParser<R> {
    reader: BufReader<R>,
    /// The logical response assembled so far.
    buf: BytesMut,
    /// Start of the line segment currently being read.
    segment_start: usize,
    /// Literal bytes still to be read before the line resumes.
    literal_remaining: usize,
    poisoned: bool,
}

impl<R> ResponseParser<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a parser bound to the given stream.
    pub fn new(stream: R) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            segment_start: 0,
            literal_remaining: 0,
            poisoned: false,
        }
    }

    /// Reads and parses the next complete response.
    ///
    /// Suspends until a full logical line, including all literal payloads,
    /// has arrived.
    pub async fn next_response(&mut self) -> Result<Response> {
        if self.poisoned {
            return Err(Error::framing(
                0,
                "response stream is unusable after a framing error",
            ));
        }

        let result = match self.read_logical_line().await {
            Ok(()) => {
                let line = self.buf.split().freeze();
                self.segment_start = 0;
                parse_line(&line)
            }
            Err(e) => Err(e),
        };

        if let Err(Error::Framing { .. }) = &result {
            self.poisoned = true;
        }
        result
    }

    /// Discards any partially assembled response and buffered literal data.
    ///
    /// Idempotent. If a partial response was discarded, the stream position
    /// no longer matches a response boundary and the parser is marked
    /// unusable.
    pub fn destroy_responses(&mut self) {
        if !self.buf.is_empty() || self.literal_remaining > 0 {
            tracing::debug!(
                buffered = self.buf.len(),
                literal_remaining = self.literal_remaining,
                "discarding partial response"
            );
            self.poisoned = true;
        }
        self.buf.clear();
        if self.buf.capacity() > DEFAULT_BUFFER_SIZE {
            self.buf = BytesMut::with_capacity(DEFAULT_BUFFER_SIZE);
        }
        self.segment_start = 0;
        self.literal_remaining = 0;
    }

    /// Returns true if the parser can no longer be read from.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns true if bytes have been received but not yet returned.
    #[must_use]
    pub fn has_buffered_data(&self) -> bool {
        !self.buf.is_empty() || !self.reader.buffer().is_empty()
    }

    /// Consumes the parser and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Reads until the current logical line is complete.
    async fn read_logical_line(&mut self) -> Result<()> {
        loop {
            if self.literal_remaining > 0 {
                self.read_literal_chunk().await?;
                continue;
            }

            if self.read_segment().await? {
                match parse_literal_length(&self.buf[self.segment_start..]) {
                    Some(len) if len > MAX_LITERAL_SIZE => {
                        return Err(Error::framing(
                            self.buf.len(),
                            format!("literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"),
                        ));
                    }
                    Some(len) => {
                        tracing::trace!(len, "S: <literal>");
                        self.literal_remaining = len;
                        self.segment_start = self.buf.len() + len;
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    /// Reads bytes up to and including the next CRLF into the buffer.
    ///
    /// Returns `true` once the CRLF has been consumed.
    async fn read_segment(&mut self) -> Result<bool> {
        let available = self.reader.fill_buf().await?;
        if available.is_empty() {
            return Err(self.eof_error());
        }

        // A CR at the end of the previous chunk may pair with an LF here.
        let pending_cr = self.buf.len() > self.segment_start && self.buf.ends_with(b"\r");
        let (take, done) = if pending_cr && available[0] == b'\n' {
            (1, true)
        } else {
            match find_crlf(available) {
                Some(pos) => (pos + 2, true),
                None => (available.len(), false),
            }
        };

        self.buf.extend_from_slice(&available[..take]);
        self.reader.consume(take);

        if self.buf.len() - self.segment_start > MAX_LINE_LENGTH {
            return Err(Error::framing(self.buf.len(), "line too long"));
        }
        if done {
            tracing::trace!(
                "S: {}",
                String::from_utf8_lossy(&self.buf[self.segment_start..]).trim_end()
            );
        }
        Ok(done)
    }

    /// Reads up to `literal_remaining` raw bytes into the buffer.
    async fn read_literal_chunk(&mut self) -> Result<()> {
        let available = self.reader.fill_buf().await?;
        if available.is_empty() {
            return Err(self.eof_error());
        }

        let take = available.len().min(self.literal_remaining);
        self.buf.extend_from_slice(&available[..take]);
        self.reader.consume(take);
        self.literal_remaining -= take;
        Ok(())
    }

    /// Classifies an end of stream.
    fn eof_error(&self) -> Error {
        if self.buf.is_empty() && self.literal_remaining == 0 {
            Error::Communication(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ))
        } else if self.literal_remaining > 0 {
            Error::framing(
                self.buf.len(),
                format!(
                    "unterminated literal: {} bytes missing",
                    self.literal_remaining
                ),
            )
        } else {
            Error::framing(self.buf.len(), "end of stream inside a response line")
        }
    }
}

impl<R> std::fmt::Debug for ResponseParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseParser")
            .field("buffered", &self.buf.len())
            .field("literal_remaining", &self.literal_remaining)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal length from the end of a line.
///
/// Matches patterns like `{123}\r\n` or `{123+}\r\n` (non-synchronizing).
/// A length that does not fit in `usize` saturates, so it is still caught
/// by the literal size limit.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);

    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    Some(digits.iter().fold(0usize, |len, &d| {
        len.saturating_mul(10).saturating_add(usize::from(d - b'0'))
    }))
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::types::Status;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
        assert_eq!(
            parse_literal_length(b"huge {99999999999999999999999}\r\n"),
            Some(usize::MAX)
        );
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut parser = ResponseParser::new(mock);

        let response = parser.next_response().await.unwrap();
        assert_eq!(response.status(), Some(Status::Ok));
        assert_eq!(response.payload().unwrap().text, "ready");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"1 OK hel")
            .read(b"lo\r")
            .read(b"\n2 NO x\r\n")
            .build();
        let mut parser = ResponseParser::new(mock);

        let first = parser.next_response().await.unwrap();
        assert_eq!(first.payload().unwrap().text, "hello");
        let second = parser.next_response().await.unwrap();
        assert_eq!(second.status(), Some(Status::No));
    }

    #[tokio::test]
    async fn test_literal_with_embedded_crlf_is_one_response() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {11}\r\n")
            .read(b"hello\r\nworld")
            .read(b")\r\n")
            .read(b"5 OK done\r\n")
            .build();
        let mut parser = ResponseParser::new(mock);

        let response = parser.next_response().await.unwrap();
        let data = response.payload().unwrap().data.clone().unwrap();
        assert_eq!(&data[..], b"1 FETCH (BODY[] {11}\r\nhello\r\nworld)");

        let done = parser.next_response().await.unwrap();
        assert_eq!(done.tag().unwrap().as_str(), "5");
    }

    #[tokio::test]
    async fn test_literal_looking_like_lines() {
        let mock = Builder::new()
            .read(b"* 2 FETCH (BODY[] {14}\r\n")
            .read(b"3 OK fake\r\n\r\n")
            .read(b"UID 9)\r\n")
            .build();
        let mut parser = ResponseParser::new(mock);

        let response = parser.next_response().await.unwrap();
        assert!(response.tag().is_none());
        assert!(response.is_keyword("FETCH"));
    }

    #[tokio::test]
    async fn test_two_literals_in_one_line() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (A {2}\r\nab B {3+}\r\ncde)\r\n")
            .build();
        let mut parser = ResponseParser::new(mock);

        let elements = parser.next_response().await.unwrap().elements().unwrap();
        let list = elements[2].as_list().unwrap();
        assert_eq!(list[1].as_text().unwrap(), "ab");
        assert_eq!(list[3].as_text().unwrap(), "cde");
    }

    #[tokio::test]
    async fn test_eof_at_boundary_is_communication_error() {
        let mock = Builder::new().build();
        let mut parser = ResponseParser::new(mock);

        let err = parser.next_response().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Communication);
        assert!(!parser.is_poisoned());
    }

    #[tokio::test]
    async fn test_unterminated_literal_is_framing_error() {
        let mock = Builder::new().read(b"* 1 FETCH (BODY {10}\r\nshort").build();
        let mut parser = ResponseParser::new(mock);

        let err = parser.next_response().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Framing);
        assert!(err.to_string().contains("unterminated literal"));
        assert!(parser.is_poisoned());

        let again = parser.next_response().await.unwrap_err();
        assert_eq!(again.kind(), crate::ErrorKind::Framing);
    }

    #[tokio::test]
    async fn test_missing_tag_poisons() {
        let mock = Builder::new().read(b" OK what\r\n").build();
        let mut parser = ResponseParser::new(mock);

        assert!(parser.next_response().await.is_err());
        assert!(parser.is_poisoned());
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let literal_size = MAX_LITERAL_SIZE + 1;
        let header = format!("* 1 FETCH (BODY {{{literal_size}}}\r\n");

        let mock = Builder::new().read(header.as_bytes()).build();
        let mut parser = ResponseParser::new(mock);

        let err = parser.next_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_unparseable_literal_length_is_framing_error() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {99999999999999999999999}\r\n3 OK fake\r\n")
            .build();
        let mut parser = ResponseParser::new(mock);

        let err = parser.next_response().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Framing);
        assert!(err.to_string().contains("literal too large"));
        assert!(parser.is_poisoned());

        let again = parser.next_response().await.unwrap_err();
        assert_eq!(again.kind(), crate::ErrorKind::Framing);
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut parser = ResponseParser::new(mock);

        let err = parser.next_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_destroy_responses_is_idempotent() {
        let mock = Builder::new().read(b"1 OK done\r\n").build();
        let mut parser = ResponseParser::new(mock);

        parser.next_response().await.unwrap();
        parser.destroy_responses();
        parser.destroy_responses();
        assert!(!parser.is_poisoned());
        assert!(!parser.has_buffered_data());
    }
}
