use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use badcards_core::net::messages::{ClientMessage, ServerMessage, SessionSnapshot, SubscribeMsg};
use badcards_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};

use badcards_server::build_app;
use badcards_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Create a session over REST. Returns the initial snapshot.
pub async fn create_session(
    client: &reqwest::Client,
    base_url: &str,
    owner_guid: Uuid,
    nickname: &str,
    rounds_to_win: Option<u32>,
) -> SessionSnapshot {
    let resp = client
        .post(format!("{base_url}/api/v1/sessions"))
        .json(&serde_json::json!({
            "owner_guid": owner_guid,
            "nickname": nickname,
            "rounds_to_win": rounds_to_win,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "session create should succeed");
    resp.json().await.unwrap()
}

/// Request to join a session over REST. Returns the snapshot.
pub async fn request_join(
    client: &reqwest::Client,
    base_url: &str,
    session_id: &str,
    guid: Uuid,
    nickname: &str,
) -> SessionSnapshot {
    let resp = client
        .post(format!("{base_url}/api/v1/sessions/{session_id}/join"))
        .json(&serde_json::json!({ "guid": guid, "nickname": nickname }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "join request should succeed");
    resp.json().await.unwrap()
}

/// Approve a pending entrant over REST. Returns the snapshot.
pub async fn approve_join(
    client: &reqwest::Client,
    base_url: &str,
    session_id: &str,
    approver: Uuid,
    target: Uuid,
) -> SessionSnapshot {
    let resp = client
        .post(format!("{base_url}/api/v1/sessions/{session_id}/approve"))
        .json(&serde_json::json!({ "guid": approver, "target": target }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "approval should succeed");
    resp.json().await.unwrap()
}

/// Connect a WebSocket client and subscribe to a session.
pub async fn ws_subscribe(url: &str, session_id: &str, guid: Uuid) -> WsStream {
    let (mut stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let msg = ClientMessage::Subscribe(SubscribeMsg {
        session_id: session_id.to_string(),
        guid,
        protocol_version: PROTOCOL_VERSION,
    });
    let encoded = encode_client_message(&msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
    stream
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read the next Snapshot frame, panicking on anything else.
pub async fn ws_read_snapshot(stream: &mut WsStream) -> SessionSnapshot {
    match ws_read_server_msg(stream).await {
        ServerMessage::Snapshot(s) => *s,
        other => panic!("Expected Snapshot, got: {other:?}"),
    }
}
