//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: wildcard forwarding plus the `/ws` relay
//! - Wire up middleware (tracing, request ID)
//! - Bind the server to a listener and serve until shutdown
//!
//! # Design Decisions
//! - State is read-only after construction: the endpoint, a pooled
//!   client, and the timeout knobs — nothing request paths can mutate
//! - Graceful shutdown is driven by the lifecycle broadcast channel

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, UpstreamEndpoint};
use crate::http::forward;
use crate::http::request::RequestIdLayer;
use crate::http::websocket;

/// Application state injected into handlers. Cloned per request; every
/// field is cheap to clone and none is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamEndpoint>,
    pub client: Client<HttpConnector, Body>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_body_size: usize,
}

/// HTTP server for the supervised proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            upstream: Arc::new(config.upstream.endpoint()),
            client,
            request_timeout: config.timeouts.request(),
            connect_timeout: config.timeouts.connect(),
            max_body_size: config.limits.max_body_size,
        };

        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ws", any(websocket::ws_handler))
            .route("/", any(forward::proxy_handler))
            .route("/{*path}", any(forward::proxy_handler))
            .with_state(state)
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
