//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the client
//! - Establish a fresh WebSocket connection to the backend per session
//! - Bidirectional frame forwarding until either side terminates
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Client upgrade is accepted before the backend is dialled, so the
//!   client always sees a successful handshake
//! - Frame-level forwarding, no message buffering; ordering is preserved
//!   per direction only
//! - The two pump directions live under one `select!`: whichever ends
//!   first cancels its sibling, then both sockets are closed
//! - Faults never leave the session; a failing client cannot affect others

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite};

use crate::http::server::AppState;

/// Upgrade handler for the `/ws` route.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state))
}

/// Bridge one client session to one freshly opened backend session.
async fn relay(mut client: WebSocket, state: AppState) {
    let connect = connect_async(state.upstream.ws_url());
    let backend = match tokio::time::timeout(state.connect_timeout, connect).await {
        Ok(Ok((stream, _handshake))) => stream,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "Backend WebSocket unreachable, closing client session");
            let _ = client.send(Message::Close(None)).await;
            return;
        }
        Err(_) => {
            tracing::warn!("Backend WebSocket connect timed out, closing client session");
            let _ = client.send(Message::Close(None)).await;
            return;
        }
    };

    tracing::debug!("Relay session established");

    let (mut backend_tx, mut backend_rx) = backend.split();
    let (mut client_tx, mut client_rx) = client.split();

    let client_to_backend = async {
        while let Some(frame) = client_rx.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => break,
            };
            if backend_tx.send(client_frame_to_backend(frame)).await.is_err() {
                break;
            }
        }
    };

    let backend_to_client = async {
        while let Some(frame) = backend_rx.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => break,
            };
            let Some(forward) = backend_frame_to_client(frame) else {
                continue;
            };
            if client_tx.send(forward).await.is_err() {
                break;
            }
        }
    };

    // Whichever pump ends first drops the other; no pump is ever left
    // running against a closed peer.
    tokio::select! {
        _ = client_to_backend => tracing::debug!("Client side of relay ended"),
        _ = backend_to_client => tracing::debug!("Backend side of relay ended"),
    }

    let _ = client_tx.close().await;
    let _ = backend_tx.close().await;

    tracing::debug!("Relay session closed");
}

/// Map a client frame onto the backend connection, same frame type.
fn client_frame_to_backend(frame: Message) -> tungstenite::Message {
    match frame {
        Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        Message::Binary(data) => tungstenite::Message::Binary(data),
        Message::Ping(data) => tungstenite::Message::Ping(data),
        Message::Pong(data) => tungstenite::Message::Pong(data),
        Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| {
            tungstenite::protocol::CloseFrame {
                code: f.code.into(),
                reason: f.reason.as_str().into(),
            }
        })),
    }
}

/// Map a backend frame onto the client connection, same frame type.
/// Raw `Frame` variants never surface from a read loop and are ignored.
fn backend_frame_to_client(frame: tungstenite::Message) -> Option<Message> {
    match frame {
        tungstenite::Message::Text(text) => Some(Message::Text(text.as_str().into())),
        tungstenite::Message::Binary(data) => Some(Message::Binary(data)),
        tungstenite::Message::Ping(data) => Some(Message::Ping(data)),
        tungstenite::Message::Pong(data) => Some(Message::Pong(data)),
        tungstenite::Message::Close(frame) => Some(Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        }))),
        tungstenite::Message::Frame(_) => None,
    }
}
