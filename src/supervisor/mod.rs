//! Backend process supervision subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     derived environment → spawn child → poll upstream until reachable
//!
//! Shutdown (any exit path):
//!     SIGTERM → bounded wait → SIGKILL on expiry
//! ```
//!
//! # Design Decisions
//! - One process per proxy run: not-started → running → terminating → stopped
//! - Request paths never read the process handle; they depend on the
//!   network endpoint alone and tolerate "not yet reachable"

pub mod process;

pub use process::{derived_environment, ProcessState, Supervisor, SupervisorError};
