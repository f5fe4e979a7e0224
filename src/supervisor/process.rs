//! Backend process ownership: spawn, readiness, termination.
//!
//! # Responsibilities
//! - Build the derived environment and spawn the single backend process
//! - Poll the upstream endpoint until it accepts traffic
//! - Terminate the backend cooperatively, escalating to a forced kill
//!
//! # Design Decisions
//! - Exactly one managed process per proxy run; no restart transition
//! - `kill_on_drop` backstops abnormal proxy exits (panic, abort)
//! - `stop` is idempotent and infallible; failures are logged, not raised

use std::collections::BTreeMap;
use std::process::ExitStatus;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::{BackendConfig, ProxyConfig, ReadinessConfig, UpstreamEndpoint};

const MONGODB_URI_DEFAULT: &str = "mongodb://localhost:27017/blockview";

/// Error type for supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The backend executable could not be spawned. Fatal for startup.
    #[error("failed to spawn backend process {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// `start` was called on a supervisor that already ran a process.
    #[error("backend process already started")]
    AlreadyStarted,

    /// The backend never became reachable within the readiness window.
    #[error("backend did not become reachable within {0:?}")]
    ReadinessTimeout(Duration),

    /// The backend exited while the proxy was still waiting for it.
    #[error("backend exited during startup: {0}")]
    ExitedDuringStartup(ExitStatus),
}

/// Liveness state of the managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Terminating,
    Stopped,
}

struct Managed {
    state: ProcessState,
    child: Option<Child>,
}

/// Owner of the single backend process.
///
/// Written at `start` and at `stop`; every request path depends only on
/// the backend's network endpoint, never on this handle.
pub struct Supervisor {
    backend: BackendConfig,
    endpoint: UpstreamEndpoint,
    readiness: ReadinessConfig,
    upstream_port: u16,
    grace: Duration,
    client: Client<HttpConnector, Body>,
    inner: Mutex<Managed>,
}

impl Supervisor {
    /// Create a supervisor for the backend described by `config`.
    pub fn new(config: &ProxyConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            backend: config.backend.clone(),
            endpoint: config.upstream.endpoint(),
            readiness: config.readiness.clone(),
            upstream_port: config.upstream.port,
            grace: config.shutdown.grace(),
            client,
            inner: Mutex::new(Managed {
                state: ProcessState::NotStarted,
                child: None,
            }),
        }
    }

    /// Spawn the backend process with its derived environment.
    ///
    /// Spawn failure (missing executable, permission denied) is fatal and
    /// must abort proxy startup.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut managed = self.inner.lock().await;
        if managed.state != ProcessState::NotStarted {
            return Err(SupervisorError::AlreadyStarted);
        }

        let env = derived_environment(std::env::vars(), self.upstream_port);

        let mut command = Command::new(&self.backend.command);
        command
            .args(&self.backend.args)
            .env_clear()
            .envs(&env)
            .kill_on_drop(true);
        if let Some(dir) = &self.backend.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| SupervisorError::Spawn {
            command: self.backend.command.clone(),
            source,
        })?;

        tracing::info!(
            pid = ?child.id(),
            command = %self.backend.command,
            upstream_port = self.upstream_port,
            "Backend process spawned"
        );

        managed.child = Some(child);
        managed.state = ProcessState::Running;
        Ok(())
    }

    /// Poll the upstream endpoint until it accepts traffic.
    ///
    /// Any HTTP response counts as reachable: the degraded 503 path keys
    /// on connection refusal, so an accepting socket is the condition
    /// that matters. Fails once the readiness window elapses, or
    /// immediately if the backend exits first.
    pub async fn wait_ready(&self) -> Result<(), SupervisorError> {
        let window = self.readiness.window();
        let deadline = tokio::time::Instant::now() + window;
        let mut ticker = tokio::time::interval(self.readiness.interval());

        loop {
            ticker.tick().await;

            // A dead child will never start listening.
            if let Some(status) = self.try_reap().await {
                return Err(SupervisorError::ExitedDuringStartup(status));
            }

            match self.probe().await {
                Ok(status) => {
                    tracing::info!(status = %status, "Backend reachable");
                    return Ok(());
                }
                Err(reason) => tracing::debug!(reason = %reason, "Backend not reachable yet"),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(SupervisorError::ReadinessTimeout(window));
            }
        }
    }

    /// Terminate the backend: cooperative signal, bounded wait, forced
    /// kill on expiry. Safe to call any number of times.
    pub async fn stop(&self) {
        let mut managed = self.inner.lock().await;
        if managed.state != ProcessState::Running {
            return;
        }
        managed.state = ProcessState::Terminating;

        let Some(mut child) = managed.child.take() else {
            managed.state = ProcessState::Stopped;
            return;
        };

        request_termination(&child);

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => tracing::info!(status = %status, "Backend exited"),
            Ok(Err(err)) => tracing::warn!(error = %err, "Waiting for backend exit failed"),
            Err(_) => {
                tracing::warn!(
                    grace = ?self.grace,
                    "Backend ignored termination request, killing"
                );
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "Force kill failed");
                }
            }
        }

        managed.state = ProcessState::Stopped;
    }

    /// Current liveness state.
    pub async fn state(&self) -> ProcessState {
        self.inner.lock().await.state
    }

    async fn try_reap(&self) -> Option<ExitStatus> {
        let mut managed = self.inner.lock().await;
        let child = managed.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                managed.child = None;
                managed.state = ProcessState::Stopped;
                Some(status)
            }
            _ => None,
        }
    }

    async fn probe(&self) -> Result<StatusCode, String> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.endpoint.health_url())
            .header("user-agent", "blockview-proxy-readiness")
            .body(Body::empty())
            .map_err(|err| err.to_string())?;

        match tokio::time::timeout(self.readiness.probe_timeout(), self.client.request(request))
            .await
        {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("probe timed out".to_string()),
        }
    }
}

/// Copy of the parent environment overlaid with the keys the backend
/// recognizes. Optional upstream credentials are inherited only when the
/// parent actually has them; absent variables stay absent.
pub fn derived_environment<I>(parent: I, upstream_port: u16) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: BTreeMap<String, String> = parent.into_iter().collect();

    let mongodb_uri = env
        .get("MONGO_URL")
        .cloned()
        .unwrap_or_else(|| MONGODB_URI_DEFAULT.to_string());
    env.insert("MONGODB_URI".to_string(), mongodb_uri);

    for (key, default) in [
        ("NODE_ENV", "development"),
        ("LOG_LEVEL", "info"),
        ("WS_ENABLED", "true"),
        ("CORS_ORIGINS", "*"),
        ("INDEXER_ENABLED", "false"),
    ] {
        if !env.contains_key(key) {
            env.insert(key.to_string(), default.to_string());
        }
    }

    env.insert("PORT".to_string(), upstream_port.to_string());
    env
}

#[cfg(unix)]
fn request_termination(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) {
    // No cooperative signal on this platform; the grace timeout below
    // escalates straight to a kill.
}
