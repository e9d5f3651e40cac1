use crate::error::IcapResult;
use crate::parser::icap::parse_status_code;
use http::{HeaderMap, HeaderName, HeaderValue, Request as HttpRequest, Response as HttpResponse};
use http::{StatusCode, Version};
use std::io::Write as _;
use tracing::trace;

/// Encapsulated HTTP status line and headers found in an ICAP reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpHead {
    pub status_code: Option<u16>,
    pub status_line: Option<String>,
    pub headers: HeaderMap,
}

pub fn http_version_str(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Serialize an HTTP request head (request line, headers, blank line) for embedding into ICAP.
pub fn serialize_http_request_head<B>(req: &HttpRequest<B>) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    let _ = write!(
        out,
        "{} {} {}\r\n",
        req.method(),
        req.uri(),
        http_version_str(req.version())
    );
    write_headers(&mut out, req.headers());
    out
}

/// Serialize an HTTP response head (status line, headers, blank line) for embedding into ICAP.
pub fn serialize_http_response_head<B>(resp: &HttpResponse<B>) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    let code: StatusCode = resp.status();
    let _ = write!(
        out,
        "{} {} {}\r\n",
        http_version_str(resp.version()),
        code.as_u16(),
        code.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, resp.headers());
    out
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

/// Parse an encapsulated HTTP header block.
///
/// A first line starting with `HTTP` is the status line. Header lines must
/// split into exactly two tokens on `:`; a line whose value holds another
/// colon (`Date: 10:52:22`, `Location: http://...`) is skipped.
pub(crate) fn parse_http_head(block: &[u8]) -> IcapResult<HttpHead> {
    let text = String::from_utf8_lossy(block);
    let mut lines = text.split("\r\n").peekable();
    let mut head = HttpHead::default();

    if let Some(first) = lines.peek()
        && first.starts_with("HTTP")
    {
        let code = parse_status_code(first)?;
        head.status_code = Some(code.as_u16());
        head.status_line = Some(first.to_string());
        lines.next();
    }

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split(':').collect();
        let [name, value] = tokens.as_slice() else {
            trace!("skipping encapsulated header line: {:?}", line);
            continue;
        };
        match (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(n), Ok(v)) => {
                head.headers.insert(n, v);
            }
            _ => trace!("skipping unparseable encapsulated header: {:?}", line),
        }
    }

    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_head_serialization() {
        let req = HttpRequest::builder()
            .method("GET")
            .uri("http://example.com/file.zip")
            .header("Host", "example.com")
            .body(())
            .unwrap();
        assert_eq!(
            serialize_http_request_head(&req),
            b"GET http://example.com/file.zip HTTP/1.1\r\nhost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn response_head_serialization() {
        let resp = HttpResponse::builder()
            .status(200)
            .header("Content-Type", "application/octet-stream")
            .body(())
            .unwrap();
        assert_eq!(
            serialize_http_response_head(&resp),
            b"HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\n\r\n"
        );
    }

    #[test]
    fn parse_status_and_headers() {
        let head = parse_http_head(
            b"HTTP/1.1 403 Forbidden\r\n\
              Content-Type: text/html\r\n\
              Content-Length: 120\r\n\
              \r\n",
        )
        .unwrap();
        assert_eq!(head.status_code, Some(403));
        assert_eq!(head.status_line.as_deref(), Some("HTTP/1.1 403 Forbidden"));
        assert_eq!(head.headers.get("content-type").unwrap(), "text/html");
        assert_eq!(head.headers.get("content-length").unwrap(), "120");
    }

    #[test]
    fn headers_with_extra_colons_are_skipped() {
        let head = parse_http_head(
            b"HTTP/1.1 200 OK\r\n\
              Date: Mon, 10 Jan 2000 09:55:21 GMT\r\n\
              Location: http://example.com/\r\n\
              Server: x\r\n\
              \r\n",
        )
        .unwrap();
        assert!(head.headers.get("date").is_none());
        assert!(head.headers.get("location").is_none());
        assert_eq!(head.headers.get("server").unwrap(), "x");
    }

    #[test]
    fn block_without_status_line_only_has_headers() {
        let head = parse_http_head(b"Host: example.com\r\n\r\n").unwrap();
        assert_eq!(head.status_code, None);
        assert_eq!(head.headers.get("host").unwrap(), "example.com");
    }

    #[test]
    fn bad_http_status_is_malformed() {
        let err = parse_http_head(b"HTTP/1.1 OK\r\n\r\n").unwrap_err();
        assert!(err.is_framing());
    }
}
