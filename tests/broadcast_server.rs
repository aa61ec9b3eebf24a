//! End-to-end tests over loopback with real websocket clients

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use perchcam::config::MemoryConfigStore;
use perchcam::device::pattern::PATTERN_MAGIC;
use perchcam::{BroadcastServer, CameraSession, ServerConfig, SessionEvent, TestPatternSource};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (Arc<BroadcastServer>, std::net::SocketAddr) {
    let server = Arc::new(BroadcastServer::new(ServerConfig::with_addr(
        "127.0.0.1:0".parse().unwrap(),
    )));
    let addr = assert_ok!(server.start().await);
    (server, addr)
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    let url = format!("ws://{}/ws/camera", addr);
    let (client, _) = assert_ok!(connect_async(url).await);
    client
}

/// Registration happens after the upgrade response, so poll for it
async fn wait_for_subscribers(server: &BroadcastServer, count: usize) {
    for _ in 0..200 {
        if server.registry().len().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} subscribers, have {}",
        count,
        server.registry().len().await
    );
}

async fn next_binary(client: &mut Client) -> Vec<u8> {
    let message = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("read error");

    match message {
        Message::Binary(data) => data,
        other => panic!("expected binary frame, got {:?}", other),
    }
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_frames_reach_every_client() {
    let (server, addr) = start_server().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    wait_for_subscribers(&server, 2).await;

    assert_eq!(server.broadcast(Bytes::from_static(b"frame-1")).await, 2);
    assert_eq!(server.broadcast(Bytes::from_static(b"frame-2")).await, 2);

    assert_eq!(next_binary(&mut first).await, b"frame-1");
    assert_eq!(next_binary(&mut first).await, b"frame-2");
    assert_eq!(next_binary(&mut second).await, b"frame-1");
    assert_eq!(next_binary(&mut second).await, b"frame-2");

    let stats = server.registry().stats();
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.deliveries, 4);

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_disconnect_does_not_affect_others() {
    let (server, addr) = start_server().await;
    let mut leaving = connect(addr).await;
    let mut staying = connect(addr).await;
    wait_for_subscribers(&server, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_subscribers(&server, 1).await;

    assert_eq!(server.broadcast(Bytes::from_static(b"after")).await, 1);
    assert_eq!(next_binary(&mut staying).await, b"after");

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_inbound_message_counts_as_disconnect() {
    let (server, addr) = start_server().await;
    let mut chatty = connect(addr).await;
    wait_for_subscribers(&server, 1).await;

    chatty.send(Message::Text("hello".into())).await.unwrap();
    wait_for_subscribers(&server, 0).await;

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_stop_closes_clients() {
    let (server, addr) = start_server().await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&server, 1).await;

    server.stop(Duration::from_secs(1)).await.unwrap();
    assert!(!server.is_running().await);
    assert_eq!(server.broadcast(Bytes::from_static(b"late")).await, 0);

    // Only a close frame, an error or the end of the stream may follow
    let next = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("client was not closed");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("unexpected message after stop: {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_limit_holds_under_concurrent_upgrades() {
    let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap()).max_connections(1);
    let server = Arc::new(BroadcastServer::new(config));
    let addr = assert_ok!(server.start().await);
    let url = format!("ws://{}/ws/camera", addr);

    let attempts = futures::future::join_all((0..4).map(|_| connect_async(url.clone()))).await;
    let mut accepted: Vec<Client> = attempts
        .into_iter()
        .filter_map(|attempt| attempt.ok().map(|(client, _)| client))
        .collect();
    assert_eq!(accepted.len(), 1);
    wait_for_subscribers(&server, 1).await;

    // The slot frees once the subscriber is gone
    let mut holder = accepted.remove(0);
    holder.close(None).await.unwrap();
    wait_for_subscribers(&server, 0).await;

    let mut replacement = None;
    for _ in 0..50 {
        if let Ok((client, _)) = connect_async(url.clone()).await {
            replacement = Some(client);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut replacement = replacement.expect("slot was never released");
    wait_for_subscribers(&server, 1).await;

    assert_eq!(server.broadcast(Bytes::from_static(b"only")).await, 1);
    assert_eq!(next_binary(&mut replacement).await, b"only");

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_http_pages() {
    let (server, addr) = start_server().await;

    let index = http_get(addr, "/").await;
    assert!(index.starts_with("HTTP/1.1 200"));
    assert!(index.contains("perchcam web interface"));

    let monitor = http_get(addr, "/live-monitor").await;
    assert!(monitor.contains("text/html"));
    assert!(monitor.contains("/ws/camera"));

    let preview = http_get(addr, "/setup-preview").await;
    assert!(preview.contains("camera-feed"));

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_plain_get_on_upgrade_route_is_rejected() {
    let (server, addr) = start_server().await;

    let response = http_get(addr, "/ws/camera").await;
    assert!(!response.starts_with("HTTP/1.1 101"));
    assert!(server.is_running().await);
    assert_eq!(server.registry().len().await, 0);

    server.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_wizard_streams_test_pattern() {
    let (server, addr) = start_server().await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&server, 1).await;

    let mut session = CameraSession::new(
        Arc::new(TestPatternSource::new()),
        Arc::clone(&server),
        Arc::new(MemoryConfigStore::default()),
        Default::default(),
    );
    session.handle(SessionEvent::Scan);
    session.handle(SessionEvent::Confirm);
    assert!(session.is_streaming());

    let frame = next_binary(&mut client).await;
    assert_eq!(&frame[..4], PATTERN_MAGIC);

    session.quit().await.unwrap();
    assert!(!server.is_running().await);
}
