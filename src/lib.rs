//! Supervised reverse proxy for the BlockView backend.
//!
//! Spawns the single backend process, forwards all inbound HTTP traffic
//! to it once reachable, and relays the `/ws` WebSocket channel in both
//! directions for the lifetime of each session.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod supervisor;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use supervisor::Supervisor;
