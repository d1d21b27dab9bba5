use futures::{SinkExt, StreamExt};
use serde_json::json;
use showtell::{BusMessage, MessageType, Presentation, PresentationServer, ServerOptions};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn start_server(slide_dir: &Path, heartbeat: Duration) -> PresentationServer {
    fs::write(slide_dir.join("intro.md"), "# Hello").expect("Failed to write slide");
    let options = ServerOptions {
        heartbeat_interval: heartbeat,
        shutdown_timeout: Duration::from_secs(1),
        ..ServerOptions::default()
    };
    let server = PresentationServer::create(
        CancellationToken::new(),
        Presentation::new("Sockets"),
        slide_dir,
        "127.0.0.1:0",
        options,
    )
    .expect("Failed to create server");
    let running = server.run().expect("Failed to start server");
    actix_web::rt::spawn(running);
    server
}

async fn connect(server: &PresentationServer, path: &str) -> WsClient {
    let addr = server.local_addr().expect("Server is not bound");
    let (ws, _) = connect_async(format!("ws://{}{}", addr, path))
        .await
        .expect("Failed to connect");
    ws
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..250 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Timed out waiting until {}", what);
}

/// The next text frame, skipping control frames
async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .expect("Socket error");
        match msg {
            Message::Text(text) => return text.as_str().to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame {:?}", other),
        }
    }
}

async fn wait_closed(ws: &mut WsClient) {
    let closed = timeout(WAIT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "Server did not close the socket");
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

#[actix_web::test]
async fn test_livereload_socket_receives_reload() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_secs(10));
    let state = server.state();

    let mut ws = connect(&server, "/livereload").await;
    wait_until("the viewer is registered", || state.livereload().connection_count() == 1).await;

    fs::write(temp_dir.path().join("intro.md"), "# Changed").expect("Failed to write slide");
    server.rerender().expect("Failed to rerender");
    assert_eq!(next_text(&mut ws).await, "Reload");

    server.rerender().expect("Failed to rerender");
    assert_eq!(next_text(&mut ws).await, "Reload");

    server.close().await;
}

#[actix_web::test]
async fn test_livereload_socket_is_pinged() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_millis(50));
    let mut ws = connect(&server, "/livereload").await;

    let pinged = timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => {}
                _ => return false,
            }
        }
    })
    .await;
    assert!(matches!(pinged, Ok(true)), "No heartbeat ping received");

    server.close().await;
}

#[actix_web::test]
async fn test_livereload_connection_dropped_when_client_goes_away() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_millis(50));
    let state = server.state();

    let ws = connect(&server, "/livereload").await;
    wait_until("the viewer is registered", || state.livereload().connection_count() == 1).await;

    drop(ws);
    wait_until("the viewer is dropped", || state.livereload().connection_count() == 0).await;

    server.close().await;
}

#[actix_web::test]
async fn test_close_ends_livereload_sockets() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_secs(10));
    let state = server.state();

    let mut ws = connect(&server, "/livereload").await;
    wait_until("the viewer is registered", || state.livereload().connection_count() == 1).await;

    server.close().await;
    wait_closed(&mut ws).await;
    wait_until("the viewer is dropped", || state.livereload().connection_count() == 0).await;
}

#[actix_web::test]
async fn test_messagebus_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_secs(10));
    let state = server.state();

    let mut listener = connect(&server, "/messagebus").await;
    let mut talker = connect(&server, "/messagebus").await;

    send_json(&mut listener, json!({"type": "subscribe", "topic": "chat"})).await;
    wait_until("the listener is subscribed", || state.bus().subscriber_count("chat") == 1).await;

    send_json(
        &mut talker,
        json!({"type": "publish", "topic": "chat", "value": {"text": "hi"}}),
    )
    .await;

    let frame = next_text(&mut listener).await;
    let msg: BusMessage = serde_json::from_str(&frame).expect("Invalid frame");
    assert_eq!(
        msg,
        BusMessage::new(MessageType::Message, "chat", json!({"text": "hi"}))
    );

    // Values published in-process reach socket subscribers as well
    state
        .bus()
        .publish("chat", json!(42))
        .await
        .expect("Failed to publish");
    let frame = next_text(&mut listener).await;
    let msg: BusMessage = serde_json::from_str(&frame).expect("Invalid frame");
    assert_eq!(msg.value, json!(42));

    server.close().await;
}

#[actix_web::test]
async fn test_messagebus_malformed_frame_closes_connection() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_secs(10));
    let state = server.state();

    let mut ws = connect(&server, "/messagebus").await;
    send_json(&mut ws, json!({"type": "subscribe", "topic": "news"})).await;
    wait_until("the client is subscribed", || state.bus().subscriber_count("news") == 1).await;

    ws.send(Message::Text("not json".into()))
        .await
        .expect("Failed to send frame");
    wait_closed(&mut ws).await;

    // The closed connection's subscriptions are gone
    wait_until("the subscription is removed", || state.bus().subscriber_count("news") == 0).await;

    server.close().await;
}

#[actix_web::test]
async fn test_messagebus_subscriptions_removed_when_client_leaves() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let server = start_server(temp_dir.path(), Duration::from_secs(10));
    let state = server.state();

    let mut ws = connect(&server, "/messagebus").await;
    send_json(&mut ws, json!({"type": "subscribe", "topic": "a"})).await;
    send_json(&mut ws, json!({"type": "subscribe", "topic": "b"})).await;
    wait_until("the client is subscribed", || {
        state.bus().subscriber_count("a") == 1 && state.bus().subscriber_count("b") == 1
    })
    .await;

    ws.close(None).await.expect("Failed to close socket");
    wait_until("the subscriptions are removed", || {
        state.bus().subscriber_count("a") == 0 && state.bus().subscriber_count("b") == 0
    })
    .await;

    server.close().await;
}
