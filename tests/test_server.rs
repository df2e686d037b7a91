//! End-to-end tests against a running server on an ephemeral port

use filesrv::config::Config;
use filesrv::server::Server;
use filesrv::server::listener;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn test_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.server.host = "127.0.0.1".to_string();
    cfg.server.port = 0;
    cfg.server.op_timeout_ms = 500;
    cfg.server.linger_ms = 10;
    cfg.static_files.root = root.to_path_buf();
    cfg
}

async fn start(root: &Path) -> Server {
    let mut server = Server::bind(&test_config(root)).await.unwrap();
    server.start();
    server
}

async fn read_all(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("timed out reading response")
        .expect("failed to read response");
    String::from_utf8(buf).expect("response is not valid UTF-8")
}

async fn request(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    read_all(&mut stream).await
}

fn body_of(response: &str) -> &str {
    let (_, body) = response.split_once("\r\n\r\n").expect("no header separator");
    body.strip_suffix("\r\n").expect("body not newline terminated")
}

async fn wait_for_active(server: &Server, expected: usize) -> bool {
    for _ in 0..500 {
        if server.active_connections() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_serves_html_file() {
    let root = tempdir().unwrap();
    let content = "<html><body>Hello</body></html>";
    std::fs::write(root.path().join("index.html"), content).unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "GET /index.html HTTP/1.1\r\n").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n"));
    assert_eq!(body_of(&response), content);
    server.stop().await;
}

#[tokio::test]
async fn test_serves_plain_text_file() {
    let root = tempdir().unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    std::fs::write(root.path().join("docs/notes.txt"), "line one\nline two\n").unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "GET /docs/notes.txt HTTP/1.1\n").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n"));
    assert_eq!(body_of(&response), "line one\nline two\n");
    server.stop().await;
}

#[tokio::test]
async fn test_uppercase_html_extension() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("PAGE.HTML"), "<b>x</b>").unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "get /PAGE.HTML HTTP/1.1\r\n").await;

    assert!(response.contains("Content-Type: text/html\r\n"));
    server.stop().await;
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "GET /missing.txt HTTP/1.1\r\n").await;

    assert_eq!(response, "HTTP/1.1 404 Not Found\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_directory_is_404() {
    let root = tempdir().unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "GET /sub HTTP/1.1\r\n").await;
    assert_eq!(response, "HTTP/1.1 404 Not Found\r\n");

    let response = request(server.local_addr(), "GET / HTTP/1.1\r\n").await;
    assert_eq!(response, "HTTP/1.1 404 Not Found\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_parent_traversal_is_404() {
    let dir = tempdir().unwrap();
    let www = dir.path().join("www");
    std::fs::create_dir(&www).unwrap();
    std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
    let mut server = start(&www).await;

    let response = request(server.local_addr(), "GET /../secret.txt HTTP/1.1\r\n").await;

    assert_eq!(response, "HTTP/1.1 404 Not Found\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_empty_line_is_500() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let response = request(server.local_addr(), "\r\n").await;

    assert_eq!(response, "HTTP/1.1 500 Invalid empty request\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_protocol_errors_are_500() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;
    let addr = server.local_addr();

    assert_eq!(
        request(addr, "POST /a HTTP/1.1\r\n").await,
        "HTTP/1.1 500 Unknown method: POST\r\n"
    );
    assert_eq!(
        request(addr, "GET /a FTP/1.1\r\n").await,
        "HTTP/1.1 500 Unknown scheme: FTP/1.1\r\n"
    );
    assert_eq!(
        request(addr, "GET /a HTTP/1.0\r\n").await,
        "HTTP/1.1 500 Unknown HTTP version: 1.0\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn test_trailing_headers_are_ignored() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("a.txt"), "alpha").unwrap();
    let mut server = start(root.path()).await;

    let response = request(
        server.local_addr(),
        "GET /a.txt HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n",
    )
    .await;

    assert_eq!(body_of(&response), "alpha");
    server.stop().await;
}

#[tokio::test]
async fn test_line_without_newline_before_eof() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("a.txt"), "alpha").unwrap();
    let mut server = start(root.path()).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET /a.txt HTTP/1.1").await.unwrap();
    stream.shutdown().await.unwrap();
    let response = read_all(&mut stream).await;

    assert_eq!(body_of(&response), "alpha");
    server.stop().await;
}

#[tokio::test]
async fn test_half_closed_without_request() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.shutdown().await.unwrap();
    let response = read_all(&mut stream).await;

    assert_eq!(response, "HTTP/1.1 500 Connection closed\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let response = read_all(&mut stream).await;

    assert_eq!(response, "HTTP/1.1 500 Request timed out\r\n");
    assert!(wait_for_active(&server, 0).await);
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_request_line() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let line = format!("GET /{} HTTP/1.1\r\n", "a".repeat(10 * 1024));
    let response = request(server.local_addr(), &line).await;

    assert_eq!(response, "HTTP/1.1 500 Request line too long\r\n");
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_releases_connection() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    assert!(wait_for_active(&server, 1).await);
    drop(stream);

    assert!(wait_for_active(&server, 0).await);
    server.stop().await;
}

#[tokio::test]
async fn test_peer_reset_during_write_releases_connection() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("big.txt"), vec![b'x'; 8 * 1024 * 1024]).unwrap();
    std::fs::write(root.path().join("a.txt"), "alpha").unwrap();
    let mut server = start(root.path()).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET /big.txt HTTP/1.1\r\n").await.unwrap();
    drop(stream);

    assert!(wait_for_active(&server, 0).await);

    let response = request(server.local_addr(), "GET /a.txt HTTP/1.1\r\n").await;
    assert_eq!(body_of(&response), "alpha");
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_get_their_own_files() {
    const CLIENTS: usize = 32;

    let root = tempdir().unwrap();
    for i in 0..CLIENTS {
        let body = format!("file {} ", i).repeat(200 + i);
        std::fs::write(root.path().join(format!("f{}.txt", i)), body).unwrap();
    }
    let mut server = start(root.path()).await;
    let addr = server.local_addr();

    let mut handles = Vec::new();
    for i in 0..CLIENTS {
        handles.push(tokio::spawn(async move {
            let response = request(addr, &format!("GET /f{}.txt HTTP/1.1\r\n", i)).await;
            (i, response)
        }));
    }

    for handle in handles {
        let (i, response) = handle.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body_of(&response), format!("file {} ", i).repeat(200 + i));
    }

    assert!(wait_for_active(&server, 0).await);
    server.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let root = tempdir().unwrap();
    let mut server = start(root.path()).await;

    server.stop().await;
    assert!(server.is_closed());
    server.stop().await;
    server.close().await;
    assert!(server.is_closed());
}

#[tokio::test]
async fn test_no_accept_after_stop() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("a.txt"), "alpha").unwrap();
    let mut server = start(root.path()).await;
    let addr = server.local_addr();

    server.stop().await;

    // Either refused outright, or never answered
    if let Ok(mut stream) = TcpStream::connect(addr).await {
        let _ = stream.write_all(b"GET /a.txt HTTP/1.1\r\n").await;
        let mut buf = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
        assert!(buf.is_empty());
    }
}

#[tokio::test]
async fn test_start_after_stop_does_nothing() {
    let root = tempdir().unwrap();
    let mut server = Server::bind(&test_config(root.path())).await.unwrap();
    let addr = server.local_addr();

    server.stop().await;
    server.start();

    assert!(server.is_closed());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_in_flight_connection_survives_stop() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("a.txt"), "alpha").unwrap();
    let mut server = start(root.path()).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    assert!(wait_for_active(&server, 1).await);

    server.stop().await;

    stream.write_all(b"GET /a.txt HTTP/1.1\r\n").await.unwrap();
    let response = read_all(&mut stream).await;
    assert_eq!(body_of(&response), "alpha");
    assert!(wait_for_active(&server, 0).await);
}

#[tokio::test]
async fn test_run_stops_after_run_duration() {
    let root = tempdir().unwrap();
    let mut cfg = test_config(root.path());
    cfg.server.run_for_ms = Some(200);

    let result = tokio::time::timeout(Duration::from_secs(5), listener::run(&cfg)).await;

    assert!(result.expect("server did not stop on its own").is_ok());
}
