//! Supervised reverse proxy for the BlockView backend.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                    PROXY                      │
//!                    │                                               │
//!   HTTP request ────┼─▶ http/server ──▶ http/forward ──────────────┼──▶ backend :8002
//!   WS upgrade  ─────┼─▶ http/server ──▶ http/websocket (2 pumps) ──┼──▶ backend :8002/ws
//!                    │                                               │
//!                    │  ┌─────────────────────────────────────────┐  │
//!                    │  │ supervisor: spawn / wait ready / stop   │──┼──▶ backend process
//!                    │  └─────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────┘
//! ```
//!
//! The backend owns all business logic; this process owns its lifecycle
//! and the wire in front of it.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blockview_proxy::config::ProxyConfig;
use blockview_proxy::http::HttpServer;
use blockview_proxy::lifecycle::{signals, Shutdown};
use blockview_proxy::supervisor::Supervisor;

/// Supervised reverse proxy: spawns the backend and forwards traffic to it.
#[derive(Parser, Debug)]
#[command(name = "blockview-proxy", version, about)]
struct Cli {
    /// Address to listen on (overrides PROXY_BIND).
    #[arg(long)]
    listen: Option<String>,

    /// Fixed internal port the backend serves on (overrides UPSTREAM_PORT).
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Backend executable (overrides BACKEND_CMD).
    #[arg(long)]
    backend_cmd: Option<String>,

    /// Backend argument; repeat for each (overrides BACKEND_ARGS).
    #[arg(long = "backend-arg")]
    backend_args: Vec<String>,

    /// Backend working directory (overrides BACKEND_DIR).
    #[arg(long)]
    backend_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(port) = self.upstream_port {
            config.upstream.port = port;
        }
        if let Some(cmd) = self.backend_cmd {
            config.backend.command = cmd;
        }
        if !self.backend_args.is_empty() {
            config.backend.args = self.backend_args;
        }
        if let Some(dir) = self.backend_dir {
            config.backend.working_dir = Some(dir);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ProxyConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "blockview_proxy={},tower_http=warn",
                config.observability.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_port = config.upstream.port,
        backend = %config.backend.command,
        "Configuration loaded"
    );

    // Bind before spawning anything so an occupied port fails cleanly.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let supervisor = Supervisor::new(&config);
    supervisor.start().await?;
    if let Err(err) = supervisor.wait_ready().await {
        supervisor.stop().await;
        return Err(err.into());
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config);
    let server_rx = shutdown.subscribe();
    let mut server_task = tokio::spawn(async move { server.run(listener, server_rx).await });

    tokio::select! {
        () = signals::shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
            // In-flight sessions get a bounded drain window, no more.
            if tokio::time::timeout(config.shutdown.drain(), &mut server_task)
                .await
                .is_err()
            {
                tracing::warn!("Drain window elapsed with traffic still in flight");
                server_task.abort();
            }
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::info!("HTTP server stopped on its own"),
                Ok(Err(err)) => tracing::error!(error = %err, "HTTP server failed"),
                Err(err) => tracing::error!(error = %err, "HTTP server task aborted"),
            }
        }
    }

    // Every exit path ends here: the backend never outlives the proxy.
    supervisor.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
