//! Body streaming with ICAP chunk framing and preview.

use crate::error::IcapResult;
use crate::parser::wire::write_chunk;
use crate::parser::{BODY_TERMINATOR, PREVIEW_EOF};
use crate::request::Body;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// What the preview left to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The whole body fit in the preview; `0; ieof` was sent.
    Complete,
    /// More data follows if the server answers `100 Continue`.
    Partial,
}

/// Send up to `preview` bytes of `body` as one chunk, then close the preview.
pub async fn write_preview<S>(stream: &mut S, body: &mut Body, preview: usize) -> IcapResult<PreviewOutcome>
where
    S: AsyncWrite + Unpin,
{
    let len = match body.content_length() {
        Some(left) => preview.min(usize::try_from(left).unwrap_or(usize::MAX)),
        None => preview,
    };
    let mut buf = vec![0u8; len];
    let n = body.fill(&mut buf).await?;
    if n > 0 {
        write_chunk(stream, &buf[..n]).await?;
    }

    let outcome = if body.is_exhausted() || n < len {
        stream.write_all(PREVIEW_EOF).await?;
        PreviewOutcome::Complete
    } else {
        stream.write_all(BODY_TERMINATOR).await?;
        PreviewOutcome::Partial
    };
    debug!("preview sent: {} of {} bytes, {:?}", n, preview, outcome);
    Ok(outcome)
}

/// Stream what is left of `body` in `chunk_size` chunks, then the zero chunk.
///
/// Returns the number of payload bytes written.
pub async fn write_remaining<S>(stream: &mut S, body: &mut Body, chunk_size: usize) -> IcapResult<u64>
where
    S: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;
    let mut chunks = 0usize;
    loop {
        let n = body.fill(&mut buf).await?;
        if n > 0 {
            write_chunk(stream, &buf[..n]).await?;
            sent += n as u64;
            chunks += 1;
            trace!("chunk {} written: {} bytes", chunks, n);
        }
        if n < buf.len() {
            break;
        }
    }
    stream.write_all(BODY_TERMINATOR).await?;
    debug!("body sent: {} bytes in {} chunks", sent, chunks);
    Ok(sent)
}
