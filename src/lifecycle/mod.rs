//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs):
//!     spawn and/or connect nodes → wait for tip → attach events → init chain
//!
//! Daemon process (process.rs):
//!     stale pid → spawn child → exit watch → SIGINT on stop
//!
//! Shutdown (shutdown.rs):
//!     trigger → loops and sleeps wake → daemon interrupted → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup: spawned daemon first, then connect-only nodes
//! - Shutdown has a timeout: the daemon gets a bounded window to exit

pub mod process;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{Supervisor, SupervisorState};
