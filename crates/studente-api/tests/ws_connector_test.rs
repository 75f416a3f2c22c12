// End-to-end tests for the WebSocket connector against a local server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use studente_api::{ConnectionConfig, ConnectionManager, ConnectionState, ReconnectConfig};

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept one client; forward what it sends to `received` and push
/// whatever arrives on `to_client`.
async fn serve_once(
    listener: TcpListener,
    received: mpsc::UnboundedSender<String>,
    mut to_client: mpsc::UnboundedReceiver<Message>,
) {
    let (tcp, _) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            outgoing = to_client.recv() => {
                let Some(msg) = outgoing else { break };
                let closing = msg.is_close();
                write.send(msg).await.unwrap();
                if closing {
                    break;
                }
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = received.send(text.as_str().to_owned());
                }
                Some(Ok(_)) => {}
                _ => break,
            }
        }
    }
}

fn local_config(port: u16) -> ConnectionConfig {
    ConnectionConfig {
        host: "127.0.0.1".into(),
        port,
        heartbeat_interval: None,
        reconnect: ReconnectConfig {
            max_attempts: Some(1),
            ..ReconnectConfig::default()
        },
        ..ConnectionConfig::default()
    }
}

async fn wait_for(manager: &ConnectionManager, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never reached {state:?}"));
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn round_trips_frames_over_a_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (received_tx, mut received) = mpsc::unbounded_channel();
    let (to_client, to_client_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(listener, received_tx, to_client_rx));

    let manager = ConnectionManager::websocket(local_config(port)).unwrap();
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    manager.set_message_handler(move |msg| {
        let _ = inbound_tx.send(msg);
    });
    manager.connect();
    wait_for(&manager, ConnectionState::Connected).await;

    // Client -> server
    assert!(manager.send(&json!({ "type": "PASSWORD_STATUS_CHECK" })));
    let text = received.recv().await.unwrap();
    let sent: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(sent["type"], "PASSWORD_STATUS_CHECK");
    assert_eq!(sent["source"], "web-client");

    // Server -> client, text and binary
    to_client
        .send(Message::text(r#"{"type":"TIMER_TICK","content":{"nowtime":5000}}"#))
        .unwrap();
    to_client
        .send(Message::binary(br#"{"service":"eks","clusters":[]}"#.to_vec()))
        .unwrap();
    assert_eq!(inbound.recv().await.unwrap()["type"], "TIMER_TICK");
    assert_eq!(inbound.recv().await.unwrap()["service"], "eks");

    manager.disconnect();
    server.await.unwrap();
}

#[tokio::test]
async fn server_close_moves_to_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (received_tx, _received) = mpsc::unbounded_channel();
    let (to_client, to_client_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve_once(listener, received_tx, to_client_rx));

    let manager = ConnectionManager::websocket(local_config(port)).unwrap();
    manager.connect();
    wait_for(&manager, ConnectionState::Connected).await;

    to_client
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "tracker crashed".into(),
        })))
        .unwrap();
    server.await.unwrap();

    wait_for(&manager, ConnectionState::Disconnected).await;
    assert_eq!(manager.reconnect_attempts(), 1);
    manager.disconnect();
}

#[tokio::test]
async fn refused_connection_schedules_a_retry() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let manager = ConnectionManager::websocket(local_config(port)).unwrap();
    manager.connect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !manager.is_reconnect_pending() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(!manager.is_connected());
    manager.disconnect();
}
