//! Response parser transitions.
//!
//! [`advance`] looks at the bytes received so far and the current
//! [`ParseState`] and decides whether a section just ended. It holds no state
//! of its own: the driver in [`ResponseParser`](super::ResponseParser) owns the
//! buffer and feeds it back after every byte.

use super::http_embed::{HttpHead, parse_http_head};
use super::icap::{IcapHead, parse_icap_head};
use super::terminator::Terminator;
use super::wire::decode_chunked;
use crate::MIN_MESSAGE_LEN;
use crate::error::IcapResult;
use crate::response::StatusCode;
use std::fmt;
use tracing::debug;

/// Where the parser is in the reply.
///
/// `mark` is the buffer offset where the previous section ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ExpectIcapHeader,
    ExpectHttpHeader {
        mark: usize,
        /// Offset of the HTTP response head inside the encapsulated area.
        res_hdr: Option<usize>,
        /// Length of the encapsulated header area (`res-body` offset).
        res_body: usize,
    },
    ExpectHttpBody {
        mark: usize,
    },
    Done,
}

impl ParseState {
    /// Terminator that closes the current section.
    pub fn terminator(&self) -> Option<Terminator> {
        match self {
            ParseState::ExpectIcapHeader => Some(Terminator::IcapHeader),
            ParseState::ExpectHttpHeader { .. } => Some(Terminator::HttpHeader),
            ParseState::ExpectHttpBody { .. } => Some(Terminator::HttpBody),
            ParseState::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ParseState::Done)
    }
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseState::ExpectIcapHeader => "ExpectIcapHeader",
            ParseState::ExpectHttpHeader { .. } => "ExpectHttpHeader",
            ParseState::ExpectHttpBody { .. } => "ExpectHttpBody",
            ParseState::Done => "Done",
        })
    }
}

/// A completed section of the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    IcapHead(IcapHead),
    HttpHead(HttpHead),
    /// De-chunked adapted body.
    Body(Vec<u8>),
}

/// Outcome of one [`advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: ParseState,
    pub section: Option<Section>,
}

impl Step {
    fn pending(state: ParseState) -> Self {
        Step {
            state,
            section: None,
        }
    }
}

/// Decide whether `buf` completes the section expected by `state`.
pub fn advance(state: ParseState, buf: &[u8]) -> IcapResult<Step> {
    match state {
        ParseState::ExpectIcapHeader => {
            if buf.len() <= MIN_MESSAGE_LEN || !Terminator::IcapHeader.matches_tail(buf) {
                return Ok(Step::pending(state));
            }
            let head = parse_icap_head(buf)?;
            let next = after_icap_head(&head, buf.len());
            debug!(
                "ICAP status {} ({} header bytes), next state {}",
                head.status_code,
                buf.len(),
                next
            );
            Ok(Step {
                state: next,
                section: Some(Section::IcapHead(head)),
            })
        }
        ParseState::ExpectHttpHeader {
            mark,
            res_hdr,
            res_body,
        } => {
            let area = &buf[mark..];
            if area.len() < res_body.max(Terminator::HttpHeader.bytes().len())
                || !Terminator::HttpHeader.matches_tail(area)
            {
                return Ok(Step::pending(state));
            }
            let start = res_hdr.filter(|&off| off < area.len()).unwrap_or(0);
            let head = parse_http_head(&area[start..])?;
            debug!(
                "encapsulated HTTP head parsed ({} bytes), status {:?}",
                area.len(),
                head.status_code
            );
            Ok(Step {
                state: ParseState::ExpectHttpBody { mark: buf.len() },
                section: Some(Section::HttpHead(head)),
            })
        }
        ParseState::ExpectHttpBody { mark } => {
            let body = &buf[mark..];
            if !Terminator::HttpBody.matches_tail(body) {
                return Ok(Step::pending(state));
            }
            match decode_chunked(body) {
                (data, Some(end)) if end == body.len() => {
                    debug!("ICAP body complete: {} bytes de-chunked", data.len());
                    Ok(Step {
                        state: ParseState::Done,
                        section: Some(Section::Body(data)),
                    })
                }
                _ => Ok(Step::pending(state)),
            }
        }
        ParseState::Done => Ok(Step::pending(state)),
    }
}

fn after_icap_head(head: &IcapHead, mark: usize) -> ParseState {
    if head.status_code != StatusCode::OK {
        // 100: the caller sends the rest of the body; anything else carries no payload we read.
        return ParseState::Done;
    }
    let enc = head.encapsulated();
    if enc.has_http_headers() {
        ParseState::ExpectHttpHeader {
            mark,
            res_hdr: enc.res_hdr,
            res_body: enc.res_body.unwrap_or(0),
        }
    } else if enc.is_null_body() {
        ParseState::Done
    } else {
        ParseState::ExpectHttpBody { mark }
    }
}
