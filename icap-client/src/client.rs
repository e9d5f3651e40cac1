//! ICAP client.
//!
//! The client frames requests, streams bodies and parses replies over a
//! stream owned by the caller. It never connects, reconnects or closes: open
//! the socket, call [`Client::send`], then shut it down yourself.
//!
//! # Example
//! ```no_run
//! use icap_client::{Body, Client, Request};
//! use tokio::io::BufStream;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> icap_client::IcapResult<()> {
//! let client = Client::builder().chunk_size(16 * 1024).build();
//!
//! let req = Request::from_uri(icap_client::Method::RespMod, "icap://127.0.0.1:1344/avscan")?
//!     .preview(1024)
//!     .allow_204(true)
//!     .with_body(Body::from_bytes(b"file contents".to_vec()));
//!
//! let mut stream = BufStream::new(TcpStream::connect(("127.0.0.1", 1344)).await?);
//! let resp = client.send(&mut stream, req).await?;
//! println!("{}", resp.status_line);
//! # Ok(())
//! # }
//! ```

mod frame;
mod options;
mod respmod;
mod streamer;

pub use frame::{build_request_frame, encapsulated_value};
pub use streamer::{PreviewOutcome, write_preview, write_remaining};

use crate::error::{Error, IcapResult};
use crate::request::{Method, Request};
use crate::response::Response;
use crate::{DEFAULT_CHUNK_SIZE, MAX_FRAME_BYTES, VERSION};
use http::header::USER_AGENT;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Immutable settings shared by every exchange.
#[derive(Debug)]
pub(crate) struct ClientConfig {
    chunk_size: usize,
    max_frame_bytes: usize,
    default_headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientConfig>,
}

impl Default for Client {
    fn default() -> Self {
        ClientBuilder::new().build()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.inner.max_frame_bytes
    }

    /// Raw bytes written before the body (request line, headers, encapsulated
    /// HTTP heads). Useful for dumps and debugging.
    pub fn get_request(&self, req: &Request) -> IcapResult<Vec<u8>> {
        build_request_frame(req, &self.inner.default_headers)
    }

    /// Run one ICAP exchange on `stream`.
    ///
    /// REQMOD is refused before anything is written.
    pub async fn send<S>(&self, stream: &mut S, req: Request) -> IcapResult<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("ICAP {} {}", req.method, req.icap_uri());
        match req.method {
            Method::Options => options::exchange(stream, &req, &self.inner).await,
            Method::RespMod => respmod::exchange(stream, req, &self.inner).await,
            Method::ReqMod => Err(Error::Unsupported(Method::ReqMod)),
        }
    }

    /// Shortcut for [`Client::send`] with an OPTIONS request.
    pub async fn options<S>(&self, stream: &mut S, req: Request) -> IcapResult<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.expect_method(&req, Method::Options)?;
        self.send(stream, req).await
    }

    /// Shortcut for [`Client::send`] with a RESPMOD request.
    pub async fn respmod<S>(&self, stream: &mut S, req: Request) -> IcapResult<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.expect_method(&req, Method::RespMod)?;
        self.send(stream, req).await
    }

    fn expect_method(&self, req: &Request, method: Method) -> IcapResult<()> {
        if req.method == method {
            Ok(())
        } else {
            Err(Error::invalid_request(format!(
                "expected a {method} request, got {}",
                req.method
            )))
        }
    }
}

#[derive(Debug)]
pub struct ClientBuilder {
    chunk_size: usize,
    max_frame_bytes: usize,
    default_headers: HeaderMap,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        if let Ok(agent) = HeaderValue::from_str(&format!("icap-client/{VERSION}")) {
            default_headers.insert(USER_AGENT, agent);
        }
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_frame_bytes: MAX_FRAME_BYTES,
            default_headers,
        }
    }

    /// Size of one body chunk on the wire. Zero is raised to one.
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    /// Upper bound for one buffered reply.
    pub fn max_frame_bytes(mut self, n: usize) -> Self {
        self.max_frame_bytes = n;
        self
    }

    /// Adds a default ICAP header (upsert). Per-request headers win.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn build(self) -> Client {
        Client {
            inner: Arc::new(ClientConfig {
                chunk_size: self.chunk_size,
                max_frame_bytes: self.max_frame_bytes,
                default_headers: self.default_headers,
            }),
        }
    }
}
