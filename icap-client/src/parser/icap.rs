use crate::error::{Error, IcapResult};
use crate::response::StatusCode;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::borrow::Cow;
use std::fmt;
use tracing::trace;

/// Offsets parsed from the `Encapsulated` header.
///
/// Offsets are **relative to the start of the encapsulated area**
/// (i.e., immediately after the ICAP headers CRLFCRLF).
///
/// Parsing is lenient: a pair whose value is not a non-negative integer
/// (`res-body=null`, `res-body=-1`, ...) leaves that entry unset, and unknown
/// keys are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encapsulated {
    pub req_hdr: Option<usize>,
    pub res_hdr: Option<usize>,
    pub req_body: Option<usize>,
    pub res_body: Option<usize>,
    pub null_body: Option<usize>,
    pub opt_body: Option<usize>,
}

impl Encapsulated {
    /// Parse only the value of the `Encapsulated:` header (right side).
    pub fn parse(val: &str) -> Self {
        let mut enc = Encapsulated::default();
        for part in val.split(',') {
            let Some((name, off)) = part.split_once('=') else {
                continue;
            };
            let slot = match name.trim().to_ascii_lowercase().as_str() {
                "req-hdr" => &mut enc.req_hdr,
                "res-hdr" => &mut enc.res_hdr,
                "req-body" => &mut enc.req_body,
                "res-body" => &mut enc.res_body,
                "null-body" => &mut enc.null_body,
                "opt-body" => &mut enc.opt_body,
                _ => continue,
            };
            *slot = off.trim().parse::<usize>().ok();
        }
        enc
    }

    /// A positive `res-body` offset means HTTP headers precede the body.
    pub fn has_http_headers(&self) -> bool {
        matches!(self.res_body, Some(n) if n > 0)
    }

    /// `null-body` with no body entry: nothing follows the headers.
    pub fn is_null_body(&self) -> bool {
        self.null_body.is_some()
            && self.res_body.is_none()
            && self.req_body.is_none()
            && self.opt_body.is_none()
    }
}

impl fmt::Display for Encapsulated {
    /// Formats the entries in wire order, e.g. `req-hdr=0, res-hdr=25, res-body=60`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = [
            ("req-hdr", self.req_hdr),
            ("res-hdr", self.res_hdr),
            ("req-body", self.req_body),
            ("res-body", self.res_body),
            ("opt-body", self.opt_body),
            ("null-body", self.null_body),
        ];
        let mut first = true;
        for (name, off) in entries {
            let Some(off) = off else { continue };
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={off}")?;
            first = false;
        }
        Ok(())
    }
}

/// Status line and headers of an ICAP reply.
#[derive(Debug, Clone, PartialEq)]
pub struct IcapHead {
    pub status_code: StatusCode,
    pub status_line: String,
    pub headers: HeaderMap,
}

impl IcapHead {
    pub fn encapsulated(&self) -> Encapsulated {
        self.headers
            .get("encapsulated")
            .and_then(|v| v.to_str().ok())
            .map(Encapsulated::parse)
            .unwrap_or_default()
    }
}

/// Parse an ICAP header block (status line, headers, terminating blank line).
pub(crate) fn parse_icap_head(block: &[u8]) -> IcapResult<IcapHead> {
    let text = String::from_utf8_lossy(block);
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default().to_string();
    let status_code = parse_status_code(&status_line)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = split_header(line) else {
            trace!("skipping ICAP header line without colon: {:?}", line);
            continue;
        };
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => trace!("skipping unparseable ICAP header: {:?}", line),
        }
    }

    Ok(IcapHead {
        status_code,
        status_line,
        headers,
    })
}

/// Status code is the second whitespace token: `ICAP/1.0 200 OK`, `HTTP/1.1 403 Forbidden`.
pub(crate) fn parse_status_code(line: &str) -> IcapResult<StatusCode> {
    line.split_whitespace()
        .nth(1)
        .and_then(|token| token.parse::<StatusCode>().ok())
        .ok_or_else(|| Error::MalformedStatusLine(line.to_string()))
}

/// Splits a header line on its first colon; values may contain further colons.
#[inline]
pub(crate) fn split_header(line: &str) -> Option<(&str, &str)> {
    let p = memchr::memchr(b':', line.as_bytes())?;
    if p == 0 {
        return None;
    }
    Some((line[..p].trim(), line[p + 1..].trim()))
}

/// Return canonical ICAP header name (title-cased, with special-cases).
/// Input should be lowercased (http::HeaderName::as_str() already is).
pub fn canon_icap_header(name: &str) -> Cow<'_, str> {
    match name {
        // ICAP core / common headers
        "methods" => Cow::Borrowed("Methods"),
        "istag" => Cow::Borrowed("ISTag"),
        "encapsulated" => Cow::Borrowed("Encapsulated"),
        "service" => Cow::Borrowed("Service"),
        "max-connections" => Cow::Borrowed("Max-Connections"),
        "options-ttl" => Cow::Borrowed("Options-TTL"),
        "preview" => Cow::Borrowed("Preview"),
        "allow" => Cow::Borrowed("Allow"),
        "service-id" => Cow::Borrowed("Service-ID"),
        "opt-body-type" => Cow::Borrowed("Opt-body-type"),
        "x-client-ip" => Cow::Borrowed("X-Client-IP"),
        // Fallback: Title-Case each hyphen-separated token.
        _ => {
            let mut out = String::with_capacity(name.len());
            for (i, seg) in name.split('-').enumerate() {
                if i > 0 {
                    out.push('-');
                }
                let mut chars = seg.chars();
                if let Some(c0) = chars.next() {
                    out.extend(c0.to_uppercase());
                    for c in chars {
                        out.extend(c.to_lowercase());
                    }
                }
            }
            Cow::Owned(out)
        }
    }
}
