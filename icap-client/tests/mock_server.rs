use icap_client::{Body, Client, Request, StatusCode};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};

// a header line like "res-body=0" also ends in "0\r\n\r\n"
const ZERO_CHUNK: &[u8] = b"\r\n0\r\n\r\n";

/// Read until the data received so far ends with a zero chunk.
async fn read_until_zero_chunk(sock: &mut TcpStream, seen: &mut Vec<u8>) {
    let mut buf = [0u8; 1024];
    loop {
        let n = sock.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed early");
        seen.extend_from_slice(&buf[..n]);
        if seen.ends_with(ZERO_CHUNK) {
            return;
        }
    }
}

/// One-shot ICAP server: answers the preview with 100, then replies with an
/// adapted body and closes the connection without a final zero chunk.
async fn start_server() -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();

        read_until_zero_chunk(&mut sock, &mut seen).await;
        sock.write_all(b"ICAP/1.0 100 Continue\r\n\r\n").await.unwrap();

        read_until_zero_chunk(&mut sock, &mut seen).await;
        sock.write_all(
            b"ICAP/1.0 200 OK\r\n\
              ISTag: \"mock-1\"\r\n\
              Encapsulated: res-body=0\r\n\
              \r\n\
              6\r\nREDACT\r\n",
        )
        .await
        .unwrap();
        sock.shutdown().await.unwrap();
        seen
    });
    (addr, handle)
}

#[tokio::test]
async fn respmod_round_trip_over_tcp() {
    let (addr, server) = start_server().await;

    let client = Client::builder().chunk_size(4).build();
    let req = Request::from_uri(
        icap_client::Method::RespMod,
        &format!("icap://127.0.0.1:{}/avscan", addr.port()),
    )
    .unwrap()
    .preview(5)
    .with_body(Body::from_bytes(b"first-second".to_vec()));

    let mut stream = BufStream::new(TcpStream::connect(addr).await.unwrap());
    let resp = client.send(&mut stream, req).await.unwrap();
    stream.shutdown().await.unwrap();

    assert_eq!(resp.status_code, StatusCode::OK);
    assert_eq!(resp.istag(), Some("\"mock-1\""));
    assert_eq!(resp.body, b"REDACT");

    let seen = String::from_utf8(server.await.unwrap()).unwrap();
    let expected_head = format!(
        "RESPMOD icap://127.0.0.1:{}/avscan ICAP/1.0\r\n",
        addr.port()
    );
    assert!(seen.starts_with(&expected_head), "{seen}");
    assert!(seen.contains("Preview: 5\r\n"));
    assert!(seen.contains("Encapsulated: res-body=0\r\n\r\n"));
    assert!(seen.ends_with(
        "5\r\nfirst\r\n0\r\n\r\n\
         4\r\n-sec\r\n3\r\nond\r\n0\r\n\r\n"
    ));
}
