use super::ClientConfig;
use super::frame::build_request_frame;
use super::streamer::{PreviewOutcome, write_preview, write_remaining};
use crate::error::{Error, IcapResult};
use crate::parser::read_response;
use crate::request::Request;
use crate::response::Response;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// RESPMOD: frame, body (with optional preview), reply.
///
/// At most two replies are read: the preview answer and, after a
/// `100 Continue`, the final one.
pub(super) async fn exchange<S>(stream: &mut S, mut req: Request, config: &ClientConfig) -> IcapResult<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = build_request_frame(&req, &config.default_headers)?;
    let preview = req.effective_preview();
    stream.write_all(&frame).await?;
    debug!("RESPMOD {} headers written ({} bytes)", req.icap_uri(), frame.len());

    let Some(body) = req.body.as_mut() else {
        stream.flush().await?;
        return read_response(stream, config.max_frame_bytes).await;
    };

    if let Some(preview) = preview {
        let outcome = write_preview(stream, body, preview).await?;
        stream.flush().await?;

        let first = read_response(stream, config.max_frame_bytes).await?;
        if !first.is_continue() {
            debug!("preview answered with {}", first.status_code);
            return Ok(first);
        }
        if outcome == PreviewOutcome::Complete {
            return Err(Error::UnexpectedContinue);
        }
        debug!("100 Continue, sending the rest of the body");
    }

    write_remaining(stream, body, config.chunk_size).await?;
    stream.flush().await?;
    let resp = read_response(stream, config.max_frame_bytes).await?;
    debug!("RESPMOD reply: {}", resp.status_line);
    Ok(resp)
}
