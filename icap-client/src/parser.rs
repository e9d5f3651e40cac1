//! Byte-wise ICAP response parser.
//!
//! ICAP replies carry no overall length: each section (ICAP headers,
//! encapsulated HTTP headers, chunked body) ends with a terminator. The
//! [`ResponseParser`] buffers the reply one byte at a time and asks the pure
//! [`advance`] function after every byte whether a section is complete.
//! Bytes past the end of the reply are never read.

pub mod http_embed;
pub mod icap;
mod state;
mod terminator;
pub mod wire;

pub use icap::Encapsulated;
pub use state::{ParseState, Section, Step, advance};
pub use terminator::{BODY_TERMINATOR, HEADER_TERMINATOR, PREVIEW_EOF, Terminator};

use crate::MAX_FRAME_BYTES;
use crate::error::{Error, IcapResult};
use crate::response::Response;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Incremental parser for one ICAP reply.
///
/// A parser is used for exactly one reply; create a new one per parse pass.
#[derive(Debug)]
pub struct ResponseParser {
    buf: Vec<u8>,
    state: ParseState,
    response: Option<Response>,
    max_frame_bytes: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(MAX_FRAME_BYTES)
    }
}

impl ResponseParser {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(512),
            state: ParseState::ExpectIcapHeader,
            response: None,
            max_frame_bytes,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Number of bytes consumed so far.
    pub fn received(&self) -> usize {
        self.buf.len()
    }

    /// Feed one byte. Returns `true` once the reply is complete.
    pub fn push(&mut self, byte: u8) -> IcapResult<bool> {
        if self.state.is_done() {
            return Ok(true);
        }
        if self.buf.len() >= self.max_frame_bytes {
            return Err(Error::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }
        self.buf.push(byte);

        let step = advance(self.state, &self.buf)?;
        if step.state != self.state {
            trace!("parser state {} -> {}", self.state, step.state);
        }
        self.state = step.state;
        match step.section {
            Some(Section::IcapHead(head)) => self.response = Some(Response::from_icap_head(head)),
            Some(Section::HttpHead(head)) => {
                if let Some(resp) = self.response.as_mut() {
                    resp.set_http_head(head);
                }
            }
            Some(Section::Body(body)) => {
                if let Some(resp) = self.response.as_mut() {
                    resp.body = body;
                }
            }
            None => {}
        }
        Ok(self.state.is_done())
    }

    /// Finish the reply.
    ///
    /// Legal once the parser is done, or at end of input on a chunk boundary
    /// of the body (the server closed the connection instead of sending the
    /// zero chunk). Anywhere else, including inside a body chunk, the reply is
    /// truncated.
    pub fn finish(self) -> IcapResult<Response> {
        let truncated = Error::Truncated {
            state: self.state,
            received: self.buf.len(),
        };
        match self.state {
            ParseState::Done => self.response.ok_or(truncated),
            ParseState::ExpectHttpBody { mark } => {
                let Some(body) = wire::decode_chunked_at_eof(&self.buf[mark..]) else {
                    return Err(truncated);
                };
                let mut resp = self.response.ok_or(truncated)?;
                resp.body = body;
                Ok(resp)
            }
            _ => Err(truncated),
        }
    }
}

/// Read one ICAP reply from `reader`, one byte at a time.
///
/// Reading stops right after the reply, so the stream stays positioned for
/// whatever follows (e.g. the final reply after a `100 Continue`). Wrap raw
/// sockets in a [`tokio::io::BufReader`] or [`tokio::io::BufStream`].
pub async fn read_response<R>(reader: &mut R, max_frame_bytes: usize) -> IcapResult<Response>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut parser = ResponseParser::new(max_frame_bytes);
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            trace!(
                "end of input in state {} after {} bytes",
                parser.state(),
                parser.received()
            );
            return parser.finish();
        }
        if parser.push(byte[0])? {
            return parser.finish();
        }
    }
}

/// Parse a reply held entirely in memory. Bytes after the reply are ignored.
pub fn parse_response(raw: &[u8]) -> IcapResult<Response> {
    let mut parser = ResponseParser::default();
    for &byte in raw {
        if parser.push(byte)? {
            break;
        }
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::StatusCode;

    #[test]
    fn options_reply_with_null_body() {
        let raw = b"ICAP/1.0 200 OK\r\n\
                    Methods: RESPMOD\r\n\
                    Service: Example ICAP Server\r\n\
                    ISTag: \"W3E4R7U9-L2E4-2\"\r\n\
                    Preview: 1024\r\n\
                    Transfer-Preview: *\r\n\
                    Encapsulated: null-body=0\r\n\
                    \r\n";
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.status_code, StatusCode::OK);
        assert_eq!(resp.get_header("methods").unwrap(), "RESPMOD");
        assert_eq!(resp.get_header("preview").unwrap(), "1024");
        assert!(resp.body.is_empty());
        assert!(!resp.has_http_head());
    }

    #[test]
    fn frame_limit_is_enforced() {
        let mut parser = ResponseParser::new(16);
        let raw = b"ICAP/1.0 200 OK\r\nISTag: way-too-long\r\n\r\n";
        let err = raw
            .iter()
            .find_map(|&b| parser.push(b).err())
            .expect("limit must trip");
        assert!(matches!(err, Error::FrameTooLarge { limit: 16 }));
        assert!(err.is_framing());
    }

    #[test]
    fn truncated_reply_is_reported_with_state() {
        let err = parse_response(b"ICAP/1.0 200 OK\r\nISTag: x\r\n").unwrap_err();
        match err {
            Error::Truncated { state, received } => {
                assert_eq!(state, ParseState::ExpectIcapHeader);
                assert_eq!(received, 27);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn eof_inside_encapsulated_head_is_truncated() {
        let err = parse_response(
            b"ICAP/1.0 200 OK\r\n\
              Encapsulated: res-hdr=0, res-body=40\r\n\
              \r\n\
              HTTP/1.1 200 OK\r\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                state: ParseState::ExpectHttpHeader { .. },
                ..
            }
        ));
    }

    #[test]
    fn eof_between_body_chunks_keeps_them() {
        let resp = parse_response(
            b"ICAP/1.0 200 OK\r\n\
              Encapsulated: res-body=0\r\n\
              \r\n\
              4\r\nsafe\r\n",
        )
        .unwrap();
        assert_eq!(resp.body, b"safe");
    }

    #[test]
    fn eof_inside_a_body_chunk_is_truncated() {
        let raw = b"ICAP/1.0 200 OK\r\n\
                    Encapsulated: res-body=0\r\n\
                    \r\n\
                    4\r\nsafe\r\n400\r\npartial";
        match parse_response(raw) {
            Err(Error::Truncated { state, received }) => {
                assert!(matches!(state, ParseState::ExpectHttpBody { .. }));
                assert_eq!(received, raw.len());
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn bytes_after_the_reply_are_not_consumed() {
        let mut parser = ResponseParser::default();
        let raw = b"ICAP/1.0 100 Continue\r\n\r\nICAP/1.0 204 No Content\r\n\r\n";
        let consumed = raw
            .iter()
            .position(|&b| parser.push(b).unwrap())
            .map(|i| i + 1)
            .unwrap();
        assert_eq!(consumed, 25);
        assert!(parser.finish().unwrap().is_continue());
    }

    #[tokio::test]
    async fn read_response_stops_at_end_of_reply() {
        let raw: &[u8] = b"ICAP/1.0 100 Continue\r\n\r\nICAP/1.0 204 No Content\r\n\r\n";
        let mut reader = raw;
        let first = read_response(&mut reader, MAX_FRAME_BYTES).await.unwrap();
        assert!(first.is_continue());
        let second = read_response(&mut reader, MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(second.status_code, StatusCode::NO_CONTENT);
        let third = read_response(&mut reader, MAX_FRAME_BYTES).await;
        assert!(matches!(
            third,
            Err(Error::Truncated {
                state: ParseState::ExpectIcapHeader,
                received: 0
            })
        ));
    }
}
