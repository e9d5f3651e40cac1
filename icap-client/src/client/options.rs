use super::ClientConfig;
use super::frame::build_request_frame;
use crate::error::IcapResult;
use crate::parser::read_response;
use crate::request::Request;
use crate::response::Response;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// OPTIONS: headers only, one reply.
pub(super) async fn exchange<S>(stream: &mut S, req: &Request, config: &ClientConfig) -> IcapResult<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = build_request_frame(req, &config.default_headers)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    debug!("OPTIONS {} sent ({} bytes)", req.icap_uri(), frame.len());

    let resp = read_response(stream, config.max_frame_bytes).await?;
    debug!("OPTIONS reply: {}", resp.status_line);
    Ok(resp)
}
