//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (+ CLI overrides)
//!     → env.rs (assemble & parse)
//!     → schema.rs validate() (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → UpstreamEndpoint derived once, shared read-only
//! ```
//!
//! # Design Decisions
//! - Config is immutable once assembled; no hot reload
//! - All fields have defaults so a bare environment still works
//! - Validation separates syntactic (parse) from semantic checks

pub mod env;
pub mod schema;

pub use env::ConfigError;
pub use schema::{
    BackendConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    ReadinessConfig, ShutdownConfig, TimeoutConfig, UpstreamConfig, UpstreamEndpoint,
};
