//! WebSocket entrypoint and connection handler.
//!
//! Upgrades HTTP to WS, opens a session, and runs one receive loop plus one
//! writer task per connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::server::GatewayState;
use crate::session::{refusal_detail, FrameReceiver};
use crate::ws_protocol::{OutboundBody, OutboundFrame};

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, params, state))
}

fn encode(frame: &OutboundFrame) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(kind = frame.kind(), error = %e, "Failed to encode outbound frame");
            None
        }
    }
}

async fn handle_connection(socket: WebSocket, params: ConnectParams, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();

    let requested = params.session_id.clone();
    let (session, rx) = match state.manager.open(params.session_id, params.user_id).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!(session_id = ?requested, error = %e, "Refusing connection");
            let frame = OutboundFrame::new(
                requested.as_deref().unwrap_or_default(),
                None,
                OutboundBody::Error(refusal_detail(&e)),
            );
            if let Some(json) = encode(&frame) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let session_id = session.id().to_string();
    info!(session_id = %session_id, user_id = ?session.user_id(), "WebSocket session opened");

    let mut send_task = tokio::spawn(write_frames(sender, rx));

    let shutdown = session.shutdown_token().clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(session_id = %session_id, "Server shutdown; closing session");
                break;
            }
            _ = &mut send_task => {
                debug!(session_id = %session_id, "Writer stopped");
                break;
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary and transport-level ping/pong
                Some(Err(e)) => {
                    debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    state.manager.disconnect(&session).await;
    drop(session);
    send_task.abort();
    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Forward queued frames to the socket until either side closes.
/// Returns the number of terminal responses delivered.
async fn write_frames<S>(mut sender: S, mut rx: FrameReceiver) -> usize
where
    S: SinkExt<Message> + Unpin,
{
    let mut responses = 0;
    while let Some(frame) = rx.recv().await {
        let Some(json) = encode(&frame) else { continue };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
        if frame.is_terminal() {
            responses += 1;
            debug!(correlation_id = ?frame.correlation_id, "Delivered response");
        }
    }
    responses
}
