use crate::parser::ParseState;
use crate::request::Method;
use thiserror::Error;

/// Error type of the ICAP client engine.
///
/// Variants fall in three groups, see [`Error::is_transport`] and
/// [`Error::is_framing`]:
/// - transport: the socket (or the body source) failed,
/// - framing: the server sent something this client cannot frame,
/// - caller: the request itself cannot be sent.
#[derive(Error, Debug)]
pub enum Error {
    /// Read or write on the underlying stream failed (reset, closed, timeout).
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// The stream ended before the response was complete: inside a header
    /// section or inside a body chunk.
    #[error("Truncated ICAP response: stream ended in state {state} after {received} bytes")]
    Truncated { state: ParseState, received: usize },

    /// No section terminator was found within the configured frame limit.
    #[error("ICAP response frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// The status line carries no usable status code.
    #[error("Malformed status line: {0:?}")]
    MalformedStatusLine(String),

    /// Server answered `100 Continue` although the preview already held the whole body.
    #[error("Unexpected 100 Continue after ieof preview")]
    UnexpectedContinue,

    /// The method is recognised but not implemented by this client.
    #[error("Unsupported ICAP method: {0}")]
    Unsupported(Method),

    /// The request cannot be framed (bad URI, bad header, unknown method).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// The network dropped: the server may be fine.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// The server is misbehaving: the bytes it sent cannot be framed.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::FrameTooLarge { .. }
                | Self::MalformedStatusLine(_)
                | Self::UnexpectedContinue
        )
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Result of ICAP operations.
pub type IcapResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(io.is_transport());
        assert!(!io.is_framing());

        let truncated = Error::Truncated {
            state: ParseState::ExpectIcapHeader,
            received: 7,
        };
        assert!(truncated.is_framing());
        assert!(!truncated.is_transport());
        assert!(truncated.to_string().contains("ExpectIcapHeader"));

        let unsupported = Error::Unsupported(Method::ReqMod);
        assert!(!unsupported.is_framing());
        assert!(!unsupported.is_transport());
        assert!(unsupported.to_string().contains("REQMOD"));
    }

    #[test]
    fn malformed_status_line_keeps_offending_text() {
        let err = Error::MalformedStatusLine("ICAP/1.0 abc OK".into());
        assert!(err.to_string().contains("ICAP/1.0 abc OK"));
    }
}
