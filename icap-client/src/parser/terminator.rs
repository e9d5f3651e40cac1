//! Byte sequences that close each section of an ICAP message.

/// Blank line closing a header block (`\r\n` after the last header line).
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Zero-length chunk closing an ICAP body: the server should wait for more.
pub const BODY_TERMINATOR: &[u8] = b"0\r\n\r\n";

/// Zero-length chunk closing a preview that already holds the whole body.
pub const PREVIEW_EOF: &[u8] = b"0; ieof\r\n\r\n";

/// Section terminators recognised by the response parser.
///
/// [`Terminator::IcapHeader`] and [`Terminator::HttpHeader`] share their bytes;
/// which one is in effect depends on the parser state, not on the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// End of the ICAP header block.
    IcapHeader,
    /// End of the encapsulated HTTP header block.
    HttpHeader,
    /// End of the encapsulated HTTP body (ICAP chunk trailer).
    HttpBody,
}

impl Terminator {
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Terminator::IcapHeader | Terminator::HttpHeader => HEADER_TERMINATOR,
            Terminator::HttpBody => BODY_TERMINATOR,
        }
    }

    /// Whether `buf` currently ends with this terminator.
    #[inline]
    pub fn matches_tail(self, buf: &[u8]) -> bool {
        buf.ends_with(self.bytes())
    }
}
