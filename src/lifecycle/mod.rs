//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main):
//!     Assemble config → Bind listener → Spawn backend → Wait ready → Serve
//!
//! Shutdown (shutdown.rs + signals.rs):
//!     Signal received → Stop accepting → Bounded drain → Stop backend
//! ```
//!
//! # Design Decisions
//! - Every exit path terminates the managed backend before the proxy exits
//! - Drain has a deadline; in-flight sessions cannot hold shutdown hostage

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
