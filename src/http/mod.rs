//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routing)
//!     → request.rs (request ID)
//!     → forward.rs (header filtering, upstream exchange)   for any path
//!     → websocket.rs (upgrade + bidirectional relay)       for /ws
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;
pub mod websocket;

pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
