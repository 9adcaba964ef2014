use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use badcards_core::net::messages::{ClientMessage, ServerMessage, SubscribeErrorMsg, SubscribeMsg};
use badcards_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, encode_server_message,
};

use crate::state::{AppState, ConnectionGuard};

/// GET /ws: upgrade and run the subscription stream for one session.
///
/// A connection is `Connecting` until its first frame, a `Subscribe`, is
/// accepted; then it is `Subscribed` and receives a full snapshot followed
/// by one frame per committed mutation. A dropped socket is a plain
/// unsubscribe; clients resubscribe from scratch and must never assume
/// incremental continuity across the gap.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first frame: must be a Subscribe.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    if first_msg.len() > MAX_MESSAGE_SIZE {
        return;
    }

    let Ok(ClientMessage::Subscribe(subscribe)) = decode_client_message(&first_msg) else {
        send_subscribe_error(&mut ws_sender, "expected a subscribe message").await;
        return;
    };

    if subscribe.protocol_version != 0 && subscribe.protocol_version != PROTOCOL_VERSION {
        send_subscribe_error(
            &mut ws_sender,
            &format!(
                "protocol version mismatch: client={}, server={PROTOCOL_VERSION}",
                subscribe.protocol_version
            ),
        )
        .await;
        return;
    }

    let SubscribeMsg {
        session_id, guid, ..
    } = subscribe;

    // Attach to the session; the first queued frame is the full snapshot.
    let (connection_id, rx) = {
        let mut store = state.store.write().await;
        match store.subscribe(&session_id, guid) {
            Ok(attached) => attached,
            Err(e) => {
                drop(store);
                send_subscribe_error(&mut ws_sender, &e.to_string()).await;
                return;
            },
        }
    };

    tracing::info!(session_id = %session_id, connection_id, %guid, "Subscriber connected");

    spawn_writer(ws_sender, rx);

    // Read loop: commands travel over REST, so only lifecycle frames matter.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Close(_) => break,
            _ => continue,
        }
    }

    // Subscriber disconnected. Queued frames to it are dropped with the receiver.
    let mut store = state.store.write().await;
    store.unsubscribe(&session_id, connection_id);
    drop(store);

    tracing::info!(session_id = %session_id, connection_id, "Subscriber disconnected");
}

async fn send_subscribe_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    reason: &str,
) {
    let msg = ServerMessage::SubscribeError(SubscribeErrorMsg {
        reason: reason.to_string(),
    });
    if let Ok(response) = encode_server_message(&msg)
        && let Err(e) = ws_sender.send(Message::Binary(response.into())).await
    {
        tracing::warn!(error = %e, "Failed to send subscribe error");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: tokio::sync::mpsc::Receiver<bytes::Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}
