mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{build_state, large_payment, test_config, young_wallet};
use txrisk::api::router::create_router;
use txrisk::alerts::ConnectionState;
use txrisk::config::AppConfig;
use txrisk::models::RawTransaction;
use txrisk::AppState;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(state: AppState) -> SocketAddr {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next JSON text frame, skipping protocol frames.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .unwrap();
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

async fn score_high(state: &AppState, tx_id: &str) {
    let raw = RawTransaction::from_value(large_payment(tx_id, "mixer")).unwrap();
    state.engine.process(raw).await.unwrap();
}

#[tokio::test]
async fn test_watch_ack_then_alert() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));
    let addr = spawn_server(state.clone()).await;

    let mut ws = connect(addr).await;
    send_json(&mut ws, json!({"watch": ["rX"]})).await;

    let ack = next_json(&mut ws).await;
    assert_eq!(ack, json!({"type": "ack", "watch": ["rX"], "dropped_count": 0}));

    score_high(&state, "ws-1").await;
    let alert = next_json(&mut ws).await;
    assert_eq!(alert["type"], "tx");
    assert_eq!(alert["seq"], 1);
    assert_eq!(alert["item"]["tx_id"], "ws-1");
    assert_eq!(alert["item"]["risk_bucket"], "high");
}

#[tokio::test]
async fn test_unwatched_address_gets_nothing() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));
    let addr = spawn_server(state.clone()).await;

    let mut ws = connect(addr).await;
    send_json(&mut ws, json!({"watch": ["rSomeoneElse"]})).await;
    next_json(&mut ws).await;

    score_high(&state, "ws-2").await;

    // A ping round-trip proves nothing was queued ahead of the pong.
    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_ping_forms_and_bad_message() {
    let (state, _store) = build_state(test_config());
    let addr = spawn_server(state).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"ping": true})).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "pong"}));

    ws.send(Message::Text("definitely not json".into())).await.unwrap();
    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("invalid JSON"));
}

#[tokio::test]
async fn test_reconnect_replays_since_seq() {
    let (state, store) = build_state(test_config());
    store.seed_profile(young_wallet("rNew"));
    let addr = spawn_server(state.clone()).await;

    score_high(&state, "missed-1").await;
    score_high(&state, "missed-2").await;
    score_high(&state, "missed-3").await;

    let mut ws = connect(addr).await;
    send_json(&mut ws, json!({"watch": ["rNew"], "since_seq": 1})).await;

    assert_eq!(next_json(&mut ws).await["type"], "ack");
    let first = next_json(&mut ws).await;
    let second = next_json(&mut ws).await;
    assert_eq!((first["seq"].clone(), first["item"]["tx_id"].clone()), (json!(2), json!("missed-2")));
    assert_eq!((second["seq"].clone(), second["item"]["tx_id"].clone()), (json!(3), json!("missed-3")));
}

#[tokio::test]
async fn test_close_removes_connection() {
    let (state, _store) = build_state(test_config());
    let addr = spawn_server(state.clone()).await;

    let mut ws = connect(addr).await;
    send_json(&mut ws, json!({"watch": []})).await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["watch"], json!(["all"]));
    assert_eq!(state.registry.len(), 1);

    ws.close(None).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while state.registry.len() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "connection was not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn heartbeat_config(interval: Duration) -> AppConfig {
    let mut config = test_config();
    config.ws_heartbeat_interval = interval;
    config.ws_missed_heartbeats = 2;
    config
}

async fn wait_for_empty_registry(state: &AppState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !state.registry.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "connection was not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_server_pings_then_closes_silent_socket() {
    let (state, _store) = build_state(heartbeat_config(Duration::from_millis(300)));
    let _monitor = state.registry.spawn_heartbeat_monitor();
    let addr = spawn_server(state.clone()).await;

    let mut ws = connect(addr).await;
    send_json(&mut ws, json!({"watch": ["rA"]})).await;
    let mut first = next_json(&mut ws).await;
    while first["type"] == "ping" {
        first = next_json(&mut ws).await;
    }
    assert_eq!(first["type"], "ack");

    assert_eq!(next_json(&mut ws).await, json!({"type": "ping"}));

    // Never answer: after two silent intervals the server ends the stream.
    wait_for_closed(&mut ws).await;
    wait_for_empty_registry(&state).await;
}

#[tokio::test]
async fn test_protocol_ping_frames_count_as_heartbeats() {
    let (state, _store) = build_state(heartbeat_config(Duration::from_millis(300)));
    let _monitor = state.registry.spawn_heartbeat_monitor();
    let addr = spawn_server(state.clone()).await;

    let mut ws = connect(addr).await;
    // Well past the 600ms close deadline, with a frame every 100ms.
    for _ in 0..12 {
        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let connections = state.registry.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].state, ConnectionState::Active);

    // Going quiet lets the monitor reap it.
    wait_for_closed(&mut ws).await;
    wait_for_empty_registry(&state).await;
}

async fn wait_for_closed(ws: &mut Client) {
    let ended = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "server kept a silent socket open");
}
