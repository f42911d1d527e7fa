use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use http_body_util::{BodyExt, Full};
use indoc::indoc;
use micro_transport::{CompletionSignal, HttpServer, RawRequest, RawResponse, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

async fn roundtrip(port: u16, request: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request.replace('\n', "\r\n").as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

fn echo(mut request: RawRequest, mut response: RawResponse) -> CompletionSignal {
    CompletionSignal::new(async move {
        let body = request.receive().unwrap().collect().await?.to_bytes();
        let reply = format!("{} {} {}", request.method(), request.target(), String::from_utf8_lossy(&body));

        response.headers_mut().unwrap().insert(header::CONTENT_LENGTH, reply.len().into());
        response.send(Full::new(Bytes::from(reply))).await?;
        Ok::<_, TransportError>(())
    })
}

#[tokio::test]
async fn bind_ephemeral_port_and_serve() {
    let server = HttpServer::create().host("127.0.0.1").port(0).bind(Arc::new(echo)).await.unwrap();
    assert_ne!(server.port(), 0);

    let response = roundtrip(
        server.port(),
        indoc! {"
        POST /echo?x=1 HTTP/1.1
        Host: localhost
        Content-Length: 5
        Connection: close

        hello"},
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("POST /echo?x=1 hello"), "{response}");

    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
    assert!(server.is_disposed());
}

#[tokio::test]
async fn head_response_keeps_content_length_without_body() {
    let handler = |_request: RawRequest, mut response: RawResponse| {
        response.headers_mut().unwrap().insert(header::CONTENT_LENGTH, HeaderValue::from(42_u64));
        drop(response);
        CompletionSignal::completed()
    };
    let server = HttpServer::create().host("127.0.0.1").bind(Arc::new(handler)).await.unwrap();

    let response = roundtrip(
        server.port(),
        indoc! {"
        HEAD /resource HTTP/1.1
        Host: localhost
        Connection: close

        "},
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.to_ascii_lowercase().contains("content-length: 42\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\n"), "{response}");

    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn failing_handler_yields_internal_server_error() {
    let handler = |_request: RawRequest, _response: RawResponse| CompletionSignal::failed(std::io::Error::other("boom"));
    let server = HttpServer::create().host("127.0.0.1").bind(Arc::new(handler)).await.unwrap();

    let response = roundtrip(
        server.port(),
        indoc! {"
        GET / HTTP/1.1
        Host: localhost
        Connection: close

        "},
    )
    .await;

    let status_line = response.lines().next().unwrap();
    assert_eq!(status_line, format!("HTTP/1.1 {}", StatusCode::INTERNAL_SERVER_ERROR));

    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn bind_to_port_in_use_fails() {
    let first = HttpServer::create().host("127.0.0.1").bind(Arc::new(echo)).await.unwrap();

    let second = HttpServer::create().host("127.0.0.1").port(first.port()).bind(Arc::new(echo)).await;
    assert!(matches!(second, Err(TransportError::Bind { .. })));

    first.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn disposed_server_refuses_connections() {
    let server = HttpServer::create().host("127.0.0.1").bind(Arc::new(echo)).await.unwrap();
    let port = server.port();

    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();

    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn sent_bodies_resolve_with_their_length_over_the_wire() {
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let handler = move |request: RawRequest, mut response: RawResponse| {
        let sent = sender.clone();
        let signal = CompletionSignal::new(async move {
            let reply = Bytes::from(request.target());
            let result = response.send(Full::new(reply)).await;
            let _ = sent.send(result.as_ref().map(|written| *written).map_err(|e| e.to_string()));
            result.map(|_| ())
        });
        let completed = sender.clone();
        signal.observe(|| {}, move |e| {
            let _ = completed.send(Err(format!("signal failed: {e}")));
        })
    };
    let server = HttpServer::create().host("127.0.0.1").bind(Arc::new(handler)).await.unwrap();

    let response = roundtrip(
        server.port(),
        indoc! {"
        GET /kept HTTP/1.1
        Host: localhost

        GET /closed HTTP/1.1
        Host: localhost
        Connection: close

        "},
    )
    .await;
    assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 2, "{response}");
    assert!(response.ends_with("\r\n\r\n/closed"), "{response}");

    let mut results = Vec::new();
    for _ in 0..2 {
        results.push(tokio::time::timeout(SHUTDOWN_TIMEOUT, receiver.recv()).await.unwrap().unwrap());
    }
    assert_eq!(results, [Ok(5), Ok(7)]);

    server.dispose(SHUTDOWN_TIMEOUT).await.unwrap();
    assert!(receiver.try_recv().is_err(), "no signal may fail");
}
