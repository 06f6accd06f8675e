//! Network round-trip against a real listener on an ephemeral port.
//!
//! Exercises the shared HTTP + WebSocket listener the way a browser viewer
//! does: `GET /initiate`, WebSocket upgrade, `handshake`, then frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use image::RgbImage;
use relay_core::protocol::frame::decode_frame_payload;
use relay_server::application::{RelayService, ViewerNotifier};
use relay_server::infrastructure::input_sink::RecordingInputSink;
use relay_server::infrastructure::{serve, ConnectionHub};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const SECRET: &str = "round-trip";
const WAIT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    service: Arc<RelayService>,
    running: Arc<AtomicBool>,
}

async fn start_relay() -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = Arc::new(ConnectionHub::new());
    let notifier: Arc<dyn ViewerNotifier> = hub.clone();
    let service = Arc::new(RelayService::new(
        SECRET,
        notifier,
        Arc::new(RecordingInputSink::new()),
    ));
    let running = Arc::new(AtomicBool::new(true));

    tokio::spawn(serve(
        listener,
        Arc::clone(&service),
        hub,
        Arc::clone(&running),
    ));

    Running {
        addr,
        service,
        running,
    }
}

/// Sends one GET and returns the response head and body.
async fn http_get(addr: SocketAddr, target: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    timeout(WAIT, stream.read_to_string(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_string(), body.to_string())
}

async fn feed_frame(service: &Arc<RelayService>) {
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || {
        service
            .process_frame(&RgbImage::new(540, 1200))
            .unwrap()
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_endpoints_answer_json_with_cors() {
    let relay = start_relay().await;

    let (head, body) = http_get(relay.addr, "/").await;
    assert!(head.starts_with("HTTP/1.1 200"));
    assert!(head
        .to_ascii_lowercase()
        .contains("access-control-allow-origin: *"));
    assert_eq!(body, r#"{"status":"ok"}"#);

    let (head, body) = http_get(relay.addr, "/initiate?token=wrong").await;
    assert!(head.starts_with("HTTP/1.1 200"));
    assert_eq!(body, r#"{"status":"error","error":"Invalid token"}"#);

    let (head, _) = http_get(relay.addr, "/missing").await;
    assert!(head.starts_with("HTTP/1.1 404"));

    relay.running.store(false, Ordering::Relaxed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_viewer_negotiates_and_receives_frames() {
    // Arrange: a relay that has seen the device screen
    let relay = start_relay().await;
    feed_frame(&relay.service).await;

    let (_, body) = http_get(relay.addr, "/initiate?token=round-trip").await;
    let initiate: serde_json::Value = serde_json::from_str(&body).unwrap();
    let token = initiate["token"].as_str().unwrap().to_string();

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", relay.addr))
        .await
        .unwrap();

    // Act: handshake with the data payload as a JSON string
    let data = serde_json::json!({"token": token, "guest_width": 360, "guest_height": 800}).to_string();
    let handshake = serde_json::json!({"event": "handshake", "data": data}).to_string();
    ws.send(Message::Text(handshake)).await.unwrap();

    // Assert: connected
    let reply = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = reply else {
        panic!("expected text, got {reply:?}");
    };
    let connected: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(connected["event"], "connected");
    assert_eq!(connected["data"]["connection_status"]["host"]["width"], 540);
    assert_eq!(connected["data"]["connection_status"]["guest"]["height"], 800);

    // Act: the next frame is delivered as a binary message
    feed_frame(&relay.service).await;
    let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();

    // Assert
    let Message::Binary(payload) = frame else {
        panic!("expected binary frame, got {frame:?}");
    };
    let (header, jpeg) = decode_frame_payload(&payload).unwrap();
    assert_eq!(header.jpeg_len as usize, jpeg.len());
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    // Act: closing the socket releases the slot
    ws.close(None).await.unwrap();
    let released = timeout(WAIT, async {
        while relay.service.current_viewer().await.is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    // Assert
    assert!(released.is_ok(), "slot was not released after close");
    relay.running.store(false, Ordering::Relaxed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_message_gets_invalid_form() {
    let relay = start_relay().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", relay.addr))
        .await
        .unwrap();

    ws.send(Message::Text(r#"{"event":"handshake","data":"not json"}"#.to_string()))
        .await
        .unwrap();
    let reply = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();

    assert_eq!(
        reply,
        Message::Text(r#"{"event":"error","data":{"message":"Invalid form"}}"#.to_string())
    );
    relay.running.store(false, Ordering::Relaxed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_websocket_upgrade_is_accepted_on_any_path() {
    let relay = start_relay().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/viewer/stream", relay.addr)).await;

    assert!(result.is_ok(), "upgrade refused: {result:?}");
    relay.running.store(false, Ordering::Relaxed);
}

/// Encodes a masked client text frame (payload shorter than 126 bytes).
fn client_text_frame(payload: &str) -> Vec<u8> {
    let mask = [0x11, 0x22, 0x33, 0x44];
    let mut frame = vec![0x81, 0x80 | payload.len() as u8];
    frame.extend_from_slice(&mask);
    frame.extend(payload.bytes().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_frame_sent_with_the_upgrade_request_is_not_lost() {
    // Arrange: upgrade request and a `destroy` from a non-viewer in one write
    let relay = start_relay().await;
    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    let mut bytes = format!(
        "GET / HTTP/1.1\r\n\
         Host: {}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n",
        relay.addr
    )
    .into_bytes();
    bytes.extend(client_text_frame(r#"{"event":"destroy"}"#));

    // Act
    stream.write_all(&bytes).await.unwrap();

    // Assert: 101 with the RFC 6455 accept key, then the refusal as a text frame
    let expected = r#"{"event":"error","data":{"message":"No permission to destroy."}}"#;
    let mut received = Vec::new();
    let reply = timeout(WAIT, async {
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&chunk[..n]);
            let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let frame = &received[end + 4..];
            if frame.len() >= 2 && frame.len() >= 2 + frame[1] as usize {
                let head = String::from_utf8_lossy(&received[..end]).to_ascii_lowercase();
                let text = String::from_utf8(frame[2..2 + frame[1] as usize].to_vec()).unwrap();
                return (head, frame[0], text);
            }
        }
    })
    .await
    .unwrap();

    let (head, opcode, text) = reply;
    assert!(head.starts_with("http/1.1 101"));
    assert!(head.contains("sec-websocket-accept: s3pplmbitxaq9kygzzhzrbk+xoo="));
    assert_eq!(opcode, 0x81);
    assert_eq!(text, expected);
    relay.running.store(false, Ordering::Relaxed);
}
