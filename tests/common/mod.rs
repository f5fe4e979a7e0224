//! Shared utilities for integration testing.
//!
//! Mock backends stand in for the supervised process: an HTTP backend
//! that records what it receives and echoes bodies back, and a WebSocket
//! backend that records client frames and can push or close on demand.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use blockview_proxy::config::ProxyConfig;
use blockview_proxy::http::HttpServer;
use blockview_proxy::lifecycle::Shutdown;

/// One request as observed by the mock HTTP backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

/// Handle to a running mock HTTP backend.
pub struct HttpBackend {
    pub addr: SocketAddr,
    pub requests: RequestLog,
}

/// Start a mock HTTP backend on an ephemeral port.
///
/// Routes: `/api/health` returns `{"ok": true}`, `/status/{code}` returns
/// the requested status, everything else is recorded and echoed back.
pub async fn start_http_backend() -> HttpBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route("/api/health", get(|| async { Json(serde_json::json!({ "ok": true })) }))
        .route("/status/{code}", any(status_handler))
        .fallback(record_and_echo)
        .with_state(requests.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    HttpBackend { addr, requests }
}

async fn status_handler(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::OK)
}

async fn record_and_echo(State(log): State<RequestLog>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    log.lock().unwrap().push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_default(),
        headers: parts.headers,
        body: bytes.clone(),
    });

    bytes.into_response()
}

/// Handle to a running mock WebSocket backend.
pub struct WsBackend {
    pub addr: SocketAddr,
    /// Text frames received from relay sessions, in arrival order.
    pub received: Arc<Mutex<Vec<String>>>,
    /// Push a text frame to every connected session.
    pub push: broadcast::Sender<String>,
    /// Close every connected session from the backend side.
    pub close: broadcast::Sender<()>,
}

#[derive(Clone)]
struct WsState {
    received: Arc<Mutex<Vec<String>>>,
    push: broadcast::Sender<String>,
    close: broadcast::Sender<()>,
}

/// Start a mock WebSocket backend serving `/ws` on an ephemeral port.
pub async fn start_ws_backend() -> WsBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let (push, _) = broadcast::channel(64);
    let (close, _) = broadcast::channel(4);

    let state = WsState {
        received: received.clone(),
        push: push.clone(),
        close: close.clone(),
    };

    let app = Router::new()
        .route("/ws", any(ws_handler))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    WsBackend {
        addr,
        received,
        push,
        close,
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(mut socket: WebSocket, state: WsState) {
    let mut push = state.push.subscribe();
    let mut close = state.close.subscribe();

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        state.received.lock().unwrap().push(text.to_string());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            text = push.recv() => {
                if let Ok(text) = text {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
            _ = close.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Start the proxy on an ephemeral port, pointed at `upstream_port`.
///
/// Returns the proxy address and the shutdown handle; trigger it at the
/// end of the test.
pub async fn start_proxy(upstream_port: u16) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.port = upstream_port;
    config.timeouts.request_secs = 5;
    config.timeouts.connect_secs = 2;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_rx = shutdown.subscribe();
    let server = HttpServer::new(&config);

    tokio::spawn(async move {
        let _ = server.run(listener, server_rx).await;
    });

    (addr, shutdown)
}

/// Reserve an ephemeral port and release it, yielding a port that now
/// refuses connections.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Poll `cond` until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
