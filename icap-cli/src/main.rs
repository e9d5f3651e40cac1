use clap::Parser;
use http::{HeaderName, HeaderValue, Request as HttpRequest, Response as HttpResponse};
use icap_client::error::IcapResult;
use icap_client::{Body, Client, Error, Method, Request, Response};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "icap-cli",
    about = "ICAP (RFC 3507) client",
    long_about = "Sends OPTIONS or RESPMOD requests to an ICAP server with a c-icap-client-like CLI"
)]
struct Args {
    /// Full ICAP URI like icap://host[:port]/service
    #[arg(short = 'u', long, default_value = "icap://127.0.0.1:1344/options")]
    uri: String,

    /// ICAP method: OPTIONS|RESPMOD (default: RESPMOD with -f or --req, else OPTIONS)
    #[arg(short = 'm', long)]
    method: Option<String>,

    /// Send this file as the response body; "-" reads stdin
    #[arg(short = 'f', long)]
    filename: Option<String>,

    /// Save the adapted body to file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Encapsulate a "GET <url>" request head
    #[arg(long = "req")]
    req_url: Option<String>,

    /// Preview size (sets `Preview: N`) unless --nopreview
    #[arg(short = 'w', long)]
    preview_size: Option<usize>,

    /// Do not send a preview
    #[arg(long = "nopreview", action = clap::ArgAction::SetTrue)]
    nopreview: bool,

    /// Do not advertise Allow: 204
    #[arg(long = "no204", action = clap::ArgAction::SetTrue)]
    no204: bool,

    /// Extra ICAP headers (repeatable): -x "Header: Value"
    #[arg(short = 'x', long)]
    xheader: Vec<String>,

    /// Extra HTTP response headers (repeatable): --rhx "Header: Value"
    #[arg(long = "rhx")]
    rhx_header: Vec<String>,

    /// Print ICAP response headers
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    /// Debug level: 1 error, 2 warn, 3 info, 4 debug, 5 trace
    #[arg(short = 'd', long)]
    debug_level: Option<u8>,

    /// Connect and exchange timeout in seconds
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Body chunk size in bytes
    #[arg(long = "chunk-size")]
    chunk_size: Option<usize>,

    /// Largest reply accepted, adapted body included, in bytes
    #[arg(long = "max-frame", default_value_t = icap_client::MAX_FRAME_BYTES)]
    max_frame: usize,

    /// Print the generated ICAP request headers without sending them
    #[arg(long = "print-request", action = clap::ArgAction::SetTrue)]
    print_request: bool,
}

#[tokio::main]
async fn main() -> IcapResult<()> {
    let args = Args::parse();

    let debug_level = args.debug_level.unwrap_or(0);
    if debug_level > 0 {
        tracing_subscriber::fmt()
            .with_max_level(match debug_level {
                1 => tracing::Level::ERROR,
                2 => tracing::Level::WARN,
                3 => tracing::Level::INFO,
                4 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            })
            .init();
    }
    debug!("Arguments: {:?}", args);

    let method = match &args.method {
        Some(m) => m.parse::<Method>()?,
        None if args.filename.is_some() || args.req_url.is_some() => Method::RespMod,
        None => Method::Options,
    };

    let client = build_client(&args);
    let req = build_request(&args, method).await?;

    if args.print_request {
        let bytes = client.get_request(&req)?;
        print!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    info!("Sending {} to {}", method, req.icap_uri());
    let exchange = run(&client, req);
    let result = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), exchange)
            .await
            .unwrap_or_else(|_| {
                Err(Error::Network(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer within {secs}s"),
                )))
            }),
        None => exchange.await,
    };

    match result {
        Ok(response) => print_response(&args, &response).await,
        Err(e) => {
            error!("ICAP request failed: {}", e);
            Err(e)
        }
    }
}

fn build_client(args: &Args) -> Client {
    let mut client = Client::builder().max_frame_bytes(args.max_frame);
    if let Some(n) = args.chunk_size {
        client = client.chunk_size(n);
    }
    client.build()
}

/// Connect, run one exchange, shut the socket down.
///
/// REQMOD is refused before connecting.
async fn run(client: &Client, req: Request) -> IcapResult<Response> {
    if req.method == Method::ReqMod {
        return Err(Error::Unsupported(Method::ReqMod));
    }
    let sock = TcpStream::connect((req.host.as_str(), req.port)).await?;
    let mut stream = BufStream::new(sock);
    let response = client.send(&mut stream, req).await;
    if let Err(e) = stream.shutdown().await {
        debug!("shutdown failed: {}", e);
    }
    response
}

async fn build_request(args: &Args, method: Method) -> IcapResult<Request> {
    let mut req = Request::from_uri(method, &args.uri)?.allow_204(!args.no204);

    for h in &args.xheader {
        let Some((name, value)) = h.split_once(':') else {
            warn!("Bad -x header format (use \"Name: Value\"): '{}'", h);
            continue;
        };
        if args.nopreview && name.trim().eq_ignore_ascii_case("preview") {
            warn!("--nopreview is set: skipping header '{}'", h);
            continue;
        }
        req = req.try_header(name.trim(), value.trim())?;
    }

    match (args.nopreview, args.preview_size) {
        (false, Some(n)) => req = req.preview(n),
        (true, Some(_)) => warn!("--nopreview overrides --preview-size, Preview will not be sent"),
        _ => {}
    }

    if method != Method::RespMod {
        return Ok(req);
    }

    if let Some(url) = &args.req_url {
        let mut http_req = HttpRequest::builder().method("GET").uri(url.as_str());
        if let Some(host) = host_from_url(url) {
            http_req = http_req.header("Host", host);
        }
        req = req.with_http_request(http_req.body(())?);
    }

    let body = match args.filename.as_deref() {
        Some("-") => Some(Body::streaming(tokio::io::stdin())),
        Some(path) => {
            let file = File::open(path).await?;
            let len = file.metadata().await?.len();
            debug!("Sending {} ({} bytes)", path, len);
            Some(Body::sized(file, len))
        }
        None => None,
    };

    let mut http_resp = HttpResponse::builder().status(200);
    if let Some(len) = body.as_ref().and_then(Body::content_length) {
        http_resp = http_resp.header("Content-Length", len);
    }
    for h in &args.rhx_header {
        let Some((name, value)) = h.split_once(':') else {
            warn!("Bad --rhx header format (use \"Name: Value\"): '{}'", h);
            continue;
        };
        http_resp = http_resp.header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    req = req.with_http_response(http_resp.body(())?);

    if let Some(body) = body {
        req = req.with_body(body);
    }
    Ok(req)
}

async fn print_response(args: &Args, response: &Response) -> IcapResult<()> {
    println!("{}", response.status_line);
    if args.verbose {
        for (name, value) in response.headers.iter() {
            println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        }
        println!();
    }
    if let Some(line) = &response.http_status_line {
        println!("{line}");
        if args.verbose
            && let Some(headers) = &response.http_headers
        {
            for (name, value) in headers.iter() {
                println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
            }
            println!();
        }
    }

    if response.body.is_empty() {
        return Ok(());
    }
    match &args.output {
        Some(path) => {
            let mut file = File::create(path).await?;
            file.write_all(&response.body).await?;
            info!("Response body written to file: {}", path);
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&response.body).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

fn host_from_url(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;
    rest.split('/').next().filter(|h| !h.is_empty())
}
