#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod client;
pub mod error;
pub mod parser;
pub mod request;
pub mod response;

pub use client::{Client, ClientBuilder};
pub use error::{Error, IcapResult};
pub use parser::{
    BODY_TERMINATOR, PREVIEW_EOF, ParseState, ResponseParser, Terminator, advance, parse_response,
    read_response,
};
pub use request::{Body, Method, Request};
pub use response::{Response, StatusCode};

///Lib version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Supported ICAP protocol version (the part after `ICAP/`).
pub const ICAP_VERSION: &str = "1.0";
/// Well-known ICAP port, omitted from request URIs.
pub const DEFAULT_PORT: u16 = 1344;
/// Default upper bound for a buffered response frame.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
/// Default size of one body chunk on the wire.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
/// Shortest reply that can carry a status code: `"ICAP/1.0 xxx "`.
pub const MIN_MESSAGE_LEN: usize = 13;
