use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use miniblog_core::config::MAX_PAYLOAD_BYTES;
use miniblog_live::{FrameSink, LiveError};
use miniblog_protocol::Frame;
use tracing::{debug, info, warn};

use crate::app::AppState;

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
///
/// The socket is server-push only: anything the client sends is read and
/// discarded so that close frames are noticed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.live.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(move |socket| {
            let live_state = Arc::clone(&state);
            state.live.track(run_connection(socket, live_state))
        })
        .into_response()
}

/// Write half of the socket as seen by a live session.
struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), LiveError> {
        debug!(bytes = frame.len(), "sending live update");
        self.0
            .send(Message::Text((&*frame).into()))
            .await
            .map_err(|e| LiveError::Transport(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), LiveError> {
        self.0
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| LiveError::Transport(e.to_string()))
    }
}

/// Per-connection task: lives for the entire WS session.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let (tx, rx) = socket.split();
    let (session, outbound) = state.live.session();
    let conn_id = session.id();
    info!(conn_id = %conn_id, "new WS connection");

    if let Err(e) = session.open().await {
        warn!(conn_id = %conn_id, error = %e, "could not join live group");
        return;
    }

    let mut sink = WsSink(tx);
    let reason = session
        .run(
            outbound,
            &mut sink,
            client_gone(rx),
            state.live.shutdown_token(),
            state.live.heartbeat(),
        )
        .await;

    // best effort; the peer may already be gone
    let _ = sink.0.send(Message::Close(None)).await;
    info!(conn_id = %conn_id, reason = reason.as_str(), "WS connection closed");
}

/// Resolves once the client closes the socket or the read side fails.
async fn client_gone(mut rx: SplitStream<WebSocket>) {
    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "WS read failed");
                break;
            }
        }
    }
}
