//! ICAP request framing: request line, ICAP headers and the encapsulated
//! HTTP heads. The body is written separately by the streamer.

use crate::error::{Error, IcapResult};
use crate::parser::Encapsulated;
use crate::parser::http_embed::{serialize_http_request_head, serialize_http_response_head};
use crate::parser::icap::canon_icap_header;
use crate::request::{Method, Request};
use http::header::{ALLOW, HOST};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::io::Write as _;

const ENCAPSULATED: HeaderName = HeaderName::from_static("encapsulated");
const PREVIEW: HeaderName = HeaderName::from_static("preview");

/// Compute the `Encapsulated` offsets for a RESPMOD request.
///
/// `req_len` and `res_len` are the serialized lengths of the original HTTP
/// request and response heads (zero when absent). Without a body the last
/// entry is `null-body` instead of `res-body`.
pub fn encapsulated_value(req_len: usize, res_len: usize, has_body: bool) -> Encapsulated {
    let mut enc = Encapsulated::default();
    if req_len > 0 {
        enc.req_hdr = Some(0);
        if res_len > 0 {
            enc.res_hdr = Some(req_len);
        }
    } else if res_len > 0 {
        enc.res_hdr = Some(0);
    }
    let body_at = req_len + res_len;
    if has_body {
        enc.res_body = Some(body_at);
    } else {
        enc.null_body = Some(body_at);
    }
    enc
}

/// Build everything written before the body.
///
/// `defaults` are client-wide headers; the request's own headers win. A
/// `Preview` header is only ever written from [`Request::effective_preview`],
/// so it always matches the preview the streamer sends.
pub fn build_request_frame(req: &Request, defaults: &HeaderMap) -> IcapResult<Vec<u8>> {
    if req.method == Method::ReqMod {
        return Err(Error::Unsupported(req.method));
    }

    let mut out = Vec::with_capacity(512);
    let _ = write!(
        out,
        "{} {} ICAP/{}\r\n",
        req.method,
        req.icap_uri(),
        req.version
    );

    let mut headers = HeaderMap::with_capacity(req.icap_headers.len() + defaults.len() + 4);
    if !req.icap_headers.contains_key(HOST) {
        headers.insert(HOST, HeaderValue::from_str(&req.host)?);
    }
    for (name, value) in req.icap_headers.iter() {
        if *name != PREVIEW {
            headers.append(name, value.clone());
        }
    }
    for (name, value) in defaults.iter() {
        if *name != PREVIEW && !req.icap_headers.contains_key(name) {
            headers.append(name, value.clone());
        }
    }
    if let Some(preview) = req.effective_preview() {
        headers.insert(PREVIEW, HeaderValue::from(preview));
    }
    if req.allow_204 && !headers.contains_key(ALLOW) {
        headers.insert(ALLOW, HeaderValue::from_static("204"));
    }

    let mut encapsulated_heads = Vec::new();
    if req.method == Method::RespMod {
        let req_hdr = req
            .http_request
            .as_ref()
            .map(serialize_http_request_head)
            .unwrap_or_default();
        let res_hdr = req
            .http_response
            .as_ref()
            .map(serialize_http_response_head)
            .unwrap_or_default();
        if !headers.contains_key(ENCAPSULATED) {
            let enc = encapsulated_value(req_hdr.len(), res_hdr.len(), req.body.is_some());
            headers.insert(ENCAPSULATED, HeaderValue::from_str(&enc.to_string())?);
        }
        encapsulated_heads = req_hdr;
        encapsulated_heads.extend_from_slice(&res_hdr);
    }

    for (name, value) in headers.iter() {
        out.extend_from_slice(canon_icap_header(name.as_str()).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&encapsulated_heads);
    Ok(out)
}
