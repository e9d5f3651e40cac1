//! ICAP request types.
//!
//! This module defines:
//! - [`Method`]: the ICAP methods this client knows about.
//! - [`Body`]: the payload streamed after the request headers.
//! - [`Request`]: everything needed to frame one ICAP request.
//!
//! A [`Request`] is a per-call value: build it, hand it to
//! [`Client::send`](crate::Client::send), drop it.
//!
//! # Example (RESPMOD with preview)
//! ```rust
//! use http::Response as HttpResponse;
//! use icap_client::{Body, Method, Request};
//!
//! let http_resp = HttpResponse::builder()
//!     .status(200)
//!     .header("Content-Type", "text/plain")
//!     .body(())
//!     .unwrap();
//!
//! let req = Request::respmod("icap.example.net", "avscan")
//!     .preview(1024)
//!     .allow_204(true)
//!     .with_http_response(http_resp)
//!     .with_body(Body::from_bytes(b"hello".to_vec()));
//!
//! assert_eq!(req.method, Method::RespMod);
//! assert_eq!(req.icap_uri(), "icap://icap.example.net/avscan");
//! assert_eq!(req.effective_preview(), Some(1024));
//! ```

use crate::error::{Error, IcapResult};
use crate::{DEFAULT_PORT, ICAP_VERSION};
use http::{HeaderMap, HeaderName, HeaderValue, Request as HttpRequest, Response as HttpResponse};
use std::fmt;
use std::io::{self, Cursor};
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt};

/// ICAP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    RespMod,
    /// Known but not implemented: sending it fails with [`Error::Unsupported`].
    ReqMod,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::RespMod => "RESPMOD",
            Method::ReqMod => "REQMOD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPTIONS" => Ok(Method::Options),
            "RESPMOD" => Ok(Method::RespMod),
            "REQMOD" => Ok(Method::ReqMod),
            other => Err(Error::invalid_request(format!("unknown ICAP method {other:?}"))),
        }
    }
}

/// Payload of a RESPMOD request.
///
/// A body with a known length can be previewed; a streaming body of unknown
/// length is always sent without preview.
pub struct Body {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    remaining: Option<u64>,
}

impl Body {
    /// In-memory body.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::sized(Cursor::new(bytes), len)
    }

    /// Reader that yields exactly `len` bytes.
    pub fn sized<R>(reader: R, len: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            remaining: Some(len),
        }
    }

    /// Reader of unknown length, read until end of stream.
    pub fn streaming<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            remaining: None,
        }
    }

    /// Declared length, if known.
    pub fn content_length(&self) -> Option<u64> {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Fill `buf` as far as the body allows.
    ///
    /// Returns fewer bytes than `buf.len()` only at the end of the body. A
    /// sized body that ends before its declared length is an `UnexpectedEof`.
    pub(crate) async fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = match self.remaining {
            Some(left) => buf.len().min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        let mut filled = 0;
        while filled < want {
            let n = self.reader.read(&mut buf[filled..want]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if let Some(left) = self.remaining.as_mut() {
            if filled < want {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("body ended {} bytes early", *left - filled as u64),
                ));
            }
            *left -= filled as u64;
        }
        Ok(filled)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

/// One ICAP request.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// ICAP server host, used in the request URI and the `Host` header.
    pub host: String,
    pub port: u16,
    /// Service path like `"avscan"`. A leading slash is allowed.
    pub service: String,
    /// ICAP version without the `ICAP/` prefix.
    pub version: String,
    /// ICAP headers, emitted in insertion order.
    pub icap_headers: HeaderMap,
    /// Original HTTP request head (`req-hdr`).
    pub http_request: Option<HttpRequest<()>>,
    /// Original HTTP response head (`res-hdr`).
    pub http_response: Option<HttpResponse<()>>,
    pub body: Option<Body>,
    /// Requested `Preview` size. Zero disables the preview.
    pub preview_size: Option<usize>,
    /// Advertise `Allow: 204`.
    pub allow_204: bool,
}

impl Request {
    pub fn new(method: Method, host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            port: DEFAULT_PORT,
            service: service.into(),
            version: ICAP_VERSION.to_string(),
            icap_headers: HeaderMap::new(),
            http_request: None,
            http_response: None,
            body: None,
            preview_size: None,
            allow_204: false,
        }
    }

    ///Construct Options Request.
    pub fn options(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self::new(Method::Options, host, service)
    }
    ///Construct RespMod Request.
    pub fn respmod(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self::new(Method::RespMod, host, service)
    }
    ///Construct ReqMod Request.
    pub fn reqmod(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self::new(Method::ReqMod, host, service)
    }

    /// Build a request from an `icap://host[:port]/service` URI.
    pub fn from_uri(method: Method, uri: &str) -> IcapResult<Self> {
        let rest = uri
            .strip_prefix("icap://")
            .ok_or_else(|| Error::invalid_request(format!("ICAP URI must start with icap://: {uri}")))?;
        let (authority, service) = rest.split_once('/').unwrap_or((rest, ""));
        if authority.is_empty() {
            return Err(Error::invalid_request(format!("ICAP URI has no host: {uri}")));
        }
        let (host, port) = match authority.rsplit_once(':') {
            // "[::1]" has no port; "[::1]:1345" does
            Some((host, port)) if !port.contains(']') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::invalid_request(format!("invalid port in {uri}")))?;
                (host, port)
            }
            _ => (authority, DEFAULT_PORT),
        };
        Ok(Self::new(method, host, service).port(port))
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn preview(mut self, n: usize) -> Self {
        self.preview_size = Some(n);
        self
    }

    pub fn allow_204(mut self, yes: bool) -> Self {
        self.allow_204 = yes;
        self
    }

    /// Set/override an ICAP header.
    pub fn insert_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.icap_headers.insert(name, value);
        self
    }

    /// Set/override an ICAP header from text, validating both parts.
    pub fn try_header(self, name: &str, value: &str) -> IcapResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        Ok(self.insert_header(name, value))
    }

    pub fn with_http_request(mut self, req: HttpRequest<()>) -> Self {
        self.http_request = Some(req);
        self
    }

    pub fn with_http_response(mut self, resp: HttpResponse<()>) -> Self {
        self.http_response = Some(resp);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// `icap://host[:port]/service`; the port is left out when it is 1344.
    pub fn icap_uri(&self) -> String {
        let service = self.service.trim_start_matches('/');
        if self.port == DEFAULT_PORT {
            format!("icap://{}/{}", self.host, service)
        } else {
            format!("icap://{}:{}/{}", self.host, self.port, service)
        }
    }

    /// Preview size asked for: [`Request::preview`] if set, otherwise a
    /// numeric `Preview` ICAP header.
    pub fn requested_preview(&self) -> Option<usize> {
        self.preview_size.or_else(|| {
            self.icap_headers
                .get("preview")?
                .to_str()
                .ok()?
                .trim()
                .parse()
                .ok()
        })
    }

    /// Preview size actually used on the wire.
    ///
    /// Only a positive size on a body of known length is previewed. The
    /// `Preview` header is always written from this value.
    pub fn effective_preview(&self) -> Option<usize> {
        let size = self.requested_preview().filter(|&n| n > 0)?;
        self.body.as_ref()?.content_length()?;
        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("respmod".parse::<Method>().unwrap(), Method::RespMod);
        assert_eq!("OPTIONS".parse::<Method>().unwrap(), Method::Options);
        assert_eq!(" ReqMod ".parse::<Method>().unwrap(), Method::ReqMod);
        assert!(matches!(
            "PUT".parse::<Method>(),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn uri_parsing() {
        let req = Request::from_uri(Method::Options, "icap://127.0.0.1:1345/avscan").unwrap();
        assert_eq!(req.host, "127.0.0.1");
        assert_eq!(req.port, 1345);
        assert_eq!(req.service, "avscan");
        assert_eq!(req.icap_uri(), "icap://127.0.0.1:1345/avscan");

        let req = Request::from_uri(Method::RespMod, "icap://icap.local/srv/scan").unwrap();
        assert_eq!(req.port, DEFAULT_PORT);
        assert_eq!(req.service, "srv/scan");
        assert_eq!(req.icap_uri(), "icap://icap.local/srv/scan");
    }

    #[test]
    fn bad_uris_are_rejected() {
        for uri in ["http://x/y", "icap:///svc", "icap://host:notaport/svc"] {
            assert!(
                matches!(Request::from_uri(Method::Options, uri), Err(Error::InvalidRequest(_))),
                "{uri}"
            );
        }
    }

    #[test]
    fn preview_needs_positive_size_and_known_length() {
        let req = Request::respmod("h", "s").preview(10);
        assert_eq!(req.effective_preview(), None);

        let req = Request::respmod("h", "s")
            .preview(0)
            .with_body(Body::from_bytes(b"abc".to_vec()));
        assert_eq!(req.effective_preview(), None);

        let req = Request::respmod("h", "s")
            .preview(10)
            .with_body(Body::streaming(tokio::io::empty()));
        assert_eq!(req.effective_preview(), None);

        let req = Request::respmod("h", "s")
            .preview(10)
            .with_body(Body::from_bytes(b"abc".to_vec()));
        assert_eq!(req.effective_preview(), Some(10));
    }

    #[test]
    fn preview_header_is_used_when_no_size_is_set() {
        let req = Request::respmod("h", "s")
            .try_header("Preview", "16")
            .unwrap()
            .with_body(Body::from_bytes(b"abc".to_vec()));
        assert_eq!(req.requested_preview(), Some(16));
        assert_eq!(req.effective_preview(), Some(16));

        let req = req.preview(8);
        assert_eq!(req.effective_preview(), Some(8));

        let req = Request::respmod("h", "s")
            .try_header("Preview", "lots")
            .unwrap()
            .with_body(Body::from_bytes(b"abc".to_vec()));
        assert_eq!(req.effective_preview(), None);
    }

    #[test]
    fn invalid_header_is_an_error() {
        assert!(Request::options("h", "s").try_header("Bad Name", "v").is_err());
        let req = Request::options("h", "s").try_header("X-Trace", "1").unwrap();
        assert_eq!(req.icap_headers.get("x-trace").unwrap(), "1");
    }

    #[tokio::test]
    async fn fill_reads_up_to_declared_length() {
        let mut body = Body::from_bytes(b"abcdefg".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(body.fill(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(body.fill(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"efg");
        assert!(body.is_exhausted());
        assert_eq!(body.fill(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_body_is_unexpected_eof() {
        let mut body = Body::sized(Cursor::new(b"ab".to_vec()), 5);
        let mut buf = [0u8; 8];
        let err = body.fill(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn streaming_body_reads_to_end() {
        let mut body = Body::streaming(Cursor::new(b"xyz".to_vec()));
        let mut buf = [0u8; 8];
        assert_eq!(body.fill(&mut buf).await.unwrap(), 3);
        assert_eq!(body.fill(&mut buf).await.unwrap(), 0);
        assert!(!body.is_exhausted());
    }
}
