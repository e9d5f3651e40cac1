//! ICAP chunk codec.
//!
//! Chunks look like HTTP/1.1 chunks (`<HEX>\r\n<bytes>\r\n`), but a body always
//! ends with a zero-length chunk and an ICAP body never carries trailers. The
//! zero chunk may carry the `ieof` extension, see [`PREVIEW_EOF`](super::PREVIEW_EOF).

use crate::error::IcapResult;
use std::io::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Parse a single chunk: returns (next_pos, is_final_zero, size).
///
/// For the final zero chunk `next_pos` points right after its size line.
pub fn parse_one_chunk(buf: &[u8], from: usize) -> Option<(usize, bool, usize)> {
    let line_end = from + memchr::memmem::find(buf.get(from..)?, b"\r\n")?;
    let size_line = &buf[from..line_end];
    let size_hex = size_line.split(|&b| b == b';').next().unwrap_or(size_line);
    let size_str = std::str::from_utf8(size_hex).ok()?.trim();
    let size = usize::from_str_radix(size_str, 16).ok()?;
    let after_size = line_end + 2;
    if size == 0 {
        return Some((after_size, true, 0));
    }
    let need = after_size.checked_add(size)?.checked_add(2)?;
    if buf.len() < need || &buf[need - 2..need] != b"\r\n" {
        return None;
    }
    Some((need, false, size))
}

/// Decode the complete chunks at the start of `buf`.
///
/// Returns the payload, the position right after the last complete data chunk
/// (after the zero chunk's size line once that was reached), and whether the
/// zero chunk was reached.
fn decode_prefix(buf: &[u8]) -> (Vec<u8>, usize, bool) {
    let mut payload = Vec::with_capacity(buf.len());
    let mut pos = 0;
    while let Some((next_pos, is_final, size)) = parse_one_chunk(buf, pos) {
        if is_final {
            return (payload, next_pos, true);
        }
        let data_start = next_pos - size - 2;
        payload.extend_from_slice(&buf[data_start..data_start + size]);
        pos = next_pos;
    }
    (payload, pos, false)
}

/// Decode an ICAP chunked body.
///
/// Returns the concatenated payload of every complete chunk and, once the zero
/// chunk and its closing CRLF were seen, the position right after them.
pub fn decode_chunked(buf: &[u8]) -> (Vec<u8>, Option<usize>) {
    let (payload, pos, is_final) = decode_prefix(buf);
    let end = (is_final && buf.get(pos..pos + 2) == Some(b"\r\n".as_slice())).then_some(pos + 2);
    (payload, end)
}

/// Decode a chunked body whose stream ended early.
///
/// Succeeds when the input stops on a chunk boundary or inside the zero
/// chunk; `None` when it stops inside a data chunk.
pub fn decode_chunked_at_eof(buf: &[u8]) -> Option<Vec<u8>> {
    let (payload, pos, is_final) = decode_prefix(buf);
    (is_final || pos == buf.len()).then_some(payload)
}

/// Write one chunk to socket.
pub async fn write_chunk<S>(stream: &mut S, data: &[u8]) -> IcapResult<()>
where
    S: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(16 + data.len() + 2);
    write_chunk_into(&mut buf, data);
    stream.write_all(&buf).await?;
    Ok(())
}

/// Write one chunk into already-assembled buffer.
pub fn write_chunk_into(out: &mut Vec<u8>, data: &[u8]) {
    let _ = write!(out, "{:X}\r\n", data.len());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_framing_uses_uppercase_hex() {
        let mut out = Vec::new();
        write_chunk_into(&mut out, &[b'x'; 26]);
        assert!(out.starts_with(b"1A\r\n"));
        assert!(out.ends_with(b"x\r\n"));
        assert_eq!(out.len(), 4 + 26 + 2);
    }

    #[test]
    fn parse_one_chunk_reports_data_and_final() {
        let buf = b"5\r\nhello\r\n0\r\n\r\n";
        assert_eq!(parse_one_chunk(buf, 0), Some((10, false, 5)));
        assert_eq!(parse_one_chunk(buf, 10), Some((13, true, 0)));
    }

    #[test]
    fn parse_one_chunk_waits_for_complete_data() {
        assert_eq!(parse_one_chunk(b"5\r\nhel", 0), None);
        assert_eq!(parse_one_chunk(b"5", 0), None);
        assert_eq!(parse_one_chunk(b"zz\r\n", 0), None);
    }

    #[test]
    fn parse_one_chunk_ignores_extensions() {
        assert_eq!(parse_one_chunk(b"0; ieof\r\n\r\n", 0), Some((9, true, 0)));
    }

    #[test]
    fn decode_complete_body() {
        let (data, end) = decode_chunked(b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");
        assert_eq!(data, b"hello world");
        assert_eq!(end, Some(26));
    }

    #[test]
    fn decode_incomplete_body_keeps_complete_chunks() {
        let (data, end) = decode_chunked(b"5\r\nhello\r\n6\r\n wo");
        assert_eq!(data, b"hello");
        assert_eq!(end, None);
    }

    #[test]
    fn payload_ending_like_a_terminator_is_not_final() {
        // chunk data "ab0\r\n" followed by its framing CRLF ends in "0\r\n\r\n"
        let (data, end) = decode_chunked(b"5\r\nab0\r\n\r\n");
        assert_eq!(data, b"ab0\r\n");
        assert_eq!(end, None);
    }

    #[test]
    fn eof_on_chunk_boundary_keeps_payload() {
        assert_eq!(decode_chunked_at_eof(b""), Some(Vec::new()));
        assert_eq!(decode_chunked_at_eof(b"4\r\nsafe\r\n"), Some(b"safe".to_vec()));
        // zero chunk started but its blank line never came
        assert_eq!(decode_chunked_at_eof(b"4\r\nsafe\r\n0\r\n"), Some(b"safe".to_vec()));
    }

    #[test]
    fn eof_inside_a_chunk_is_rejected() {
        assert_eq!(decode_chunked_at_eof(b"4\r\nsafe\r\n400\r\npartial"), None);
        assert_eq!(decode_chunked_at_eof(b"4\r\nsafe\r\n3\r\nto"), None);
        assert_eq!(decode_chunked_at_eof(b"4\r\nsafe\r\n1"), None);
        assert_eq!(decode_chunked_at_eof(b"4\r\nsa"), None);
    }

    #[tokio::test]
    async fn write_chunk_to_stream() {
        let mut sink = Vec::new();
        write_chunk(&mut sink, b"hello").await.unwrap();
        assert_eq!(sink, b"5\r\nhello\r\n");
    }
}
