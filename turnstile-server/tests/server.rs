use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use turnstile::{AdmissionConfig, AdmissionController};
use turnstile_server::http::serve_listener;
use turnstile_server::middleware::AdmissionState;

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_server_limits_by_peer_address() {
    let config = AdmissionConfig {
        capacity_or_limit: 2,
        refill_rate_per_sec_or_window_seconds: 0.0,
        ..AdmissionConfig::default()
    };
    let controller = AdmissionController::from_config(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve_listener(
        listener,
        AdmissionState::new(controller.clone(), false),
        async move {
            let _ = stop_rx.await;
        },
    ));

    // Each connection uses a new source port, but the key is the IP only
    assert!(get(addr, "/admit").await.starts_with("HTTP/1.1 200"));
    let second = get(addr, "/admit").await;
    assert!(second.starts_with("HTTP/1.1 200"));
    assert!(second.contains("\"key\":\"127.0.0.1\""));
    assert!(get(addr, "/admit").await.starts_with("HTTP/1.1 429"));

    // Health checks are never limited
    let health = get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.ends_with("OK"));

    let stats = get(addr, "/stats").await;
    assert!(stats.contains("\"allowed\":2"));
    assert!(stats.contains("\"denied\":1"));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    controller.shutdown().await;
    assert!(!controller.is_reaping());
}
