//! Configuration assembly from the process environment.
//!
//! The proxy is configured the way the original deployment is: a handful
//! of well-known environment variables, each optional, overlaid on the
//! schema defaults. There is no config file.

use std::env;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// Error type for configuration assembly.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    /// Listener and upstream would contend for the same port.
    #[error("listener and upstream must use distinct ports (both {0})")]
    PortClash(u16),

    /// No backend executable configured.
    #[error("backend command must not be empty")]
    EmptyBackendCommand,
}

impl ProxyConfig {
    /// Build and validate a configuration from the environment.
    ///
    /// Recognized variables: `PROXY_BIND`, `UPSTREAM_PORT`, `BACKEND_CMD`,
    /// `BACKEND_ARGS` (whitespace-separated), `BACKEND_DIR`, `LOG_LEVEL`.
    /// Anything unset falls back to the schema defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("PROXY_BIND") {
            config.listener.bind_address = value;
        }
        if let Ok(value) = env::var("UPSTREAM_PORT") {
            config.upstream.port = value.parse().map_err(|_| ConfigError::Invalid {
                key: "UPSTREAM_PORT",
                value,
            })?;
        }
        if let Ok(value) = env::var("BACKEND_CMD") {
            config.backend.command = value;
        }
        if let Ok(value) = env::var("BACKEND_ARGS") {
            config.backend.args = value.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(value) = env::var("BACKEND_DIR") {
            config.backend.working_dir = Some(value.into());
        }
        if let Ok(value) = env::var("LOG_LEVEL") {
            config.observability.log_level = value;
        }

        config.validate()?;
        Ok(config)
    }
}
