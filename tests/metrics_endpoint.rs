use std::net::SocketAddr;

use greenhouse_app::{MetricsServer, RequestCounter, TelemetryError};
use prometheus::Registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write request");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}

async fn start(registry: Registry) -> SocketAddr {
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let server = MetricsServer::bind(addr, registry).await.expect("bind");
    let local = server.local_addr().expect("local addr");
    tokio::spawn(server.serve());
    local
}

#[tokio::test]
async fn scrape_returns_cumulative_count() {
    let registry = Registry::new();
    let counter = RequestCounter::register(&registry).expect("register");
    let addr = start(registry).await;

    counter.inc();
    counter.inc();

    let response = get(addr, "/metrics").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.to_ascii_lowercase().contains("content-type: text/plain"));
    assert!(response.contains("app_requests_total 2"));

    counter.inc();
    let response = get(addr, "/").await;
    assert!(response.contains("app_requests_total 3"));
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let addr = start(Registry::new()).await;
    let response = get(addr, "/healthz").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}

#[tokio::test]
async fn occupied_port_fails_at_bind() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind placeholder listener");
    let addr = taken.local_addr().expect("placeholder addr");

    let result = MetricsServer::bind(addr, Registry::new()).await;
    assert!(matches!(result, Err(TelemetryError::Bind { .. })));
}
