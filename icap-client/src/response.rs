//! ICAP response types.
//!
//! This module defines:
//! - [`StatusCode`]: a validated ICAP status code (RFC 3507, 100–599).
//! - [`Response`]: the structured reply returned by the client, with the ICAP
//!   headers, the optional encapsulated HTTP status/headers and the adapted body.
//!
//! Only `100 Continue` and `200 OK` change how a reply is read; every other
//! code is passed through with its headers.
//!
//! # Examples
//!
//! ```rust
//! use icap_client::{StatusCode, parse_response};
//!
//! let resp = parse_response(
//!     b"ICAP/1.0 204 No Content\r\nISTag: \"policy-123\"\r\nEncapsulated: null-body=0\r\n\r\n",
//! )
//! .unwrap();
//!
//! assert_eq!(resp.status_code, StatusCode::NO_CONTENT);
//! assert!(resp.is_success());
//! assert_eq!(resp.istag(), Some("\"policy-123\""));
//! ```

use crate::parser::Encapsulated;
use crate::parser::http_embed::HttpHead;
use crate::parser::icap::IcapHead;
use http::{HeaderMap, HeaderValue};
use std::fmt;
use std::str::FromStr;

/// ICAP status code.
///
/// Any value in `100..=599` is accepted; the associated constants name the
/// codes RFC 3507 defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const PARTIAL_CONTENT: StatusCode = StatusCode(206);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const REQUEST_ENTITY_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    pub const VERSION_NOT_SUPPORTED: StatusCode = StatusCode(505);

    /// Build a status code, rejecting values outside `100..=599`.
    pub fn from_u16(code: u16) -> Result<Self, InvalidStatusCode> {
        if (100..=599).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(InvalidStatusCode(()))
        }
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Reason phrase from RFC 3507 §4.3.3, if the code is one of them.
    pub fn canonical_reason(self) -> Option<&'static str> {
        Some(match self.0 {
            100 => "Continue",
            200 => "OK",
            204 => "No Content",
            206 => "Partial Content",
            400 => "Bad Request",
            404 => "ICAP Service Not Found",
            405 => "Method Not Allowed For Service",
            408 => "Request Timeout",
            413 => "Request Entity Too Large",
            500 => "Server Error",
            501 => "Method Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Overloaded",
            505 => "ICAP Version Not Supported",
            _ => return None,
        })
    }

    pub fn is_informational(self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = InvalidStatusCode;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        StatusCode::from_u16(v)
    }
}

impl FromStr for StatusCode {
    type Err = InvalidStatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .map_err(|_| InvalidStatusCode(()))
            .and_then(StatusCode::from_u16)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.0
    }
}

/// Returned when a value is not a valid ICAP status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatusCode(());

impl fmt::Display for InvalidStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid ICAP status code")
    }
}

impl std::error::Error for InvalidStatusCode {}

/// Structured ICAP reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// ICAP status code.
    pub status_code: StatusCode,
    /// Raw status line without its CRLF, e.g. `ICAP/1.0 200 OK`.
    pub status_line: String,
    /// ICAP headers.
    pub headers: HeaderMap,
    /// Status code of the encapsulated HTTP response, if one was present.
    pub http_status_code: Option<u16>,
    /// Raw status line of the encapsulated HTTP response.
    pub http_status_line: Option<String>,
    /// Headers of the encapsulated HTTP message.
    pub http_headers: Option<HeaderMap>,
    /// Adapted body, de-chunked. Empty when the server sent none.
    pub body: Vec<u8>,
}

impl Response {
    pub(crate) fn from_icap_head(head: IcapHead) -> Self {
        Self {
            status_code: head.status_code,
            status_line: head.status_line,
            headers: head.headers,
            http_status_code: None,
            http_status_line: None,
            http_headers: None,
            body: Vec::new(),
        }
    }

    pub(crate) fn set_http_head(&mut self, head: HttpHead) {
        self.http_status_code = head.status_code;
        self.http_status_line = head.status_line;
        self.http_headers = Some(head.headers);
    }

    /// `100 Continue`: the server wants the rest of the previewed body.
    pub fn is_continue(&self) -> bool {
        self.status_code == StatusCode::CONTINUE
    }

    /// Whether the response indicates success (2xx).
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Whether the response indicates an error (4xx/5xx).
    pub fn is_error(&self) -> bool {
        self.status_code.is_client_error() || self.status_code.is_server_error()
    }

    /// Reason phrase as sent by the server (may be empty).
    pub fn reason(&self) -> &str {
        let mut parts = self.status_line.splitn(3, ' ');
        parts.nth(2).unwrap_or("").trim()
    }

    /// Get a header value by name.
    pub fn get_header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// The `ISTag` header as text.
    pub fn istag(&self) -> Option<&str> {
        self.get_header("istag").and_then(|v| v.to_str().ok())
    }

    /// Offsets announced by the `Encapsulated` header.
    pub fn encapsulated(&self) -> Option<Encapsulated> {
        self.get_header("encapsulated")
            .and_then(|v| v.to_str().ok())
            .map(Encapsulated::parse)
    }

    /// Whether the reply carried an encapsulated HTTP header block.
    pub fn has_http_head(&self) -> bool {
        self.http_headers.is_some() || self.http_status_code.is_some()
    }
}

impl fmt::Display for Response {
    /// Formats the reply for debugging: status line, headers, encapsulated status line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status_line)?;
        for (name, value) in self.headers.iter() {
            writeln!(
                f,
                "{}: {}",
                crate::parser::icap::canon_icap_header(name.as_str()),
                String::from_utf8_lossy(value.as_bytes())
            )?;
        }
        if let Some(line) = &self.http_status_line {
            writeln!(f, "\n{line}")?;
        }
        if let Some(headers) = &self.http_headers {
            for (name, value) in headers.iter() {
                writeln!(
                    f,
                    "{}: {}",
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes())
                )?;
            }
        }
        Ok(())
    }
}
