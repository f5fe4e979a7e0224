//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits; every section has defaults so a config
//! assembled from a sparse environment is still complete.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the supervised proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream endpoint the managed backend serves on.
    pub upstream: UpstreamConfig,

    /// Backend process launch configuration.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Backend readiness polling.
    pub readiness: ReadinessConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request size limits.
    pub limits: LimitsConfig,
}

impl ProxyConfig {
    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), super::ConfigError> {
        let listen_port = self
            .listener
            .bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| super::ConfigError::Invalid {
                key: "PROXY_BIND",
                value: self.listener.bind_address.clone(),
            })?;

        // The backend must not fight the proxy for its own port.
        if listen_port == self.upstream.port {
            return Err(super::ConfigError::PortClash(listen_port));
        }

        if self.backend.command.trim().is_empty() {
            return Err(super::ConfigError::EmptyBackendCommand);
        }

        Ok(())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8001".to_string(),
        }
    }
}

/// Upstream (managed backend) endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Host the backend listens on.
    pub host: String,

    /// Fixed internal port the backend is told to serve on.
    pub port: u16,

    /// WebSocket upgrade path exposed by the backend.
    pub ws_path: String,

    /// Path probed while waiting for the backend to come up.
    pub health_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8002,
            ws_path: "/ws".to_string(),
            health_path: "/api/health".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Derive the read-only endpoint used by every request path.
    pub fn endpoint(&self) -> UpstreamEndpoint {
        let http_base = format!("http://{}:{}", self.host, self.port);
        UpstreamEndpoint {
            ws_url: format!("ws://{}:{}{}", self.host, self.port, self.ws_path),
            health_url: format!("{}{}", http_base, self.health_path),
            http_base,
        }
    }
}

/// Resolved upstream addresses, derived once from [`UpstreamConfig`] and
/// shared read-only for the lifetime of the proxy.
#[derive(Debug, Clone)]
pub struct UpstreamEndpoint {
    http_base: String,
    ws_url: String,
    health_url: String,
}

impl UpstreamEndpoint {
    /// Base HTTP URL, no trailing slash.
    pub fn http_base(&self) -> &str {
        &self.http_base
    }

    /// Full WebSocket URL for the backend's upgrade endpoint.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full URL of the readiness probe target.
    pub fn health_url(&self) -> &str {
        &self.health_url
    }
}

/// Backend process launch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable to spawn.
    pub command: String,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Working directory for the backend, if different from the proxy's.
    pub working_dir: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: "node_modules/.bin/tsx".to_string(),
            args: vec!["src/server.ts".to_string()],
            working_dir: None,
        }
    }
}

/// Timeout configuration for upstream exchanges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend WebSocket connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-call upstream request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// Readiness polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Interval between probes in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Overall window in seconds; startup fails when it elapses.
    pub window_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            probe_timeout_secs: 2,
            window_secs: 30,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Shutdown behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period for the backend to exit voluntarily, in seconds.
    pub grace_secs: u64,

    /// Maximum time to drain in-flight proxy traffic, in seconds.
    pub drain_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: 5,
            drain_secs: 10,
        }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
