//! WebSocket endpoint for the sandbox protocol.
//!
//! Each connection to `/api/preview/session` opens one sandbox session and
//! plays its isolated context: host messages (`handshake`,
//! `update_content`) are written to the socket as JSON and context messages
//! (`preview_ready`, `content_ack`) are read from it.  Before the handshake
//! the socket receives a transport-level notice naming the session, so the
//! editor can address content pushes to it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use blockpreview_sandbox::{ContextMessage, SessionId};

use crate::state::AppState;

/// First frame on every protocol socket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionNotice {
    #[serde(rename = "type")]
    kind: &'static str,
    session_id: SessionId,
}

/// Upgrade handler for `GET /api/preview/session`.
pub async fn session_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (handle, endpoint) = state.host.open();
    let session_id = handle.id();
    tracing::info!(session_id = %session_id, "preview context connected");

    let (mut sink, mut stream) = socket.split();
    let (mut from_host, to_host) = endpoint.split();

    let notice = SessionNotice {
        kind: "session",
        session_id,
    };
    if send_json(&mut sink, &notice).await.is_err() {
        handle.close().await;
        return;
    }

    // Host -> socket.  Ends when the session closes and drops its sender.
    let mut outbound = tokio::spawn(async move {
        while let Some(message) = from_host.recv().await {
            if send_json(&mut sink, &message).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Socket -> host.
    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Ignore binary, ping, pong.
                    Some(Ok(_)) => continue,
                };
                match serde_json::from_str::<ContextMessage>(text.as_str()) {
                    Ok(message) => {
                        if to_host.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "ignoring malformed context message"
                        );
                    }
                }
            }
            _ = &mut outbound => break,
        }
    }

    // Dropping the sender tells the actor the context is gone.
    drop(to_host);
    outbound.abort();
    tracing::info!(session_id = %session_id, "preview context disconnected");
}

async fn send_json<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}
